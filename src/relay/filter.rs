/// Suppresses the blank-line fragments the completions API tends to emit
/// before any real content.
///
/// A fragment containing a newline is dropped until two fragments have been
/// forwarded. Dropped fragments do not advance the counter, so any number of
/// leading newline fragments can be discarded. The threshold of 2 and the
/// newline-containment test match the upstream API's observed behavior and
/// are deliberately left as-is.
#[derive(Debug, Default)]
pub struct FragmentFilter {
    forwarded: usize,
}

const LEADING_FRAGMENTS_CHECKED: usize = 2;

impl FragmentFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the fragment should be forwarded downstream. Only
    /// admitted fragments count toward the leading-fragment threshold.
    pub fn admit(&mut self, text: &str) -> bool {
        if self.forwarded < LEADING_FRAGMENTS_CHECKED && text.contains('\n') {
            return false;
        }

        self.forwarded += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::FragmentFilter;

    #[test]
    fn drops_leading_newline_fragments() {
        let mut filter = FragmentFilter::new();
        assert!(!filter.admit("\n\n"));
        assert!(!filter.admit("\n"));
        assert!(filter.admit("Hello"));
    }

    #[test]
    fn drops_any_number_of_leading_newline_fragments() {
        let mut filter = FragmentFilter::new();
        for _ in 0..10 {
            assert!(!filter.admit("\n\n"));
        }
        assert!(filter.admit("Tacos"));
    }

    #[test]
    fn newline_check_applies_until_two_fragments_forwarded() {
        let mut filter = FragmentFilter::new();
        assert!(filter.admit("Hello"));
        // one fragment forwarded, newline fragments are still dropped
        assert!(!filter.admit(" world\n"));
        assert!(filter.admit(" world"));
        // two forwarded, newlines now pass through untouched
        assert!(filter.admit("\n\n"));
    }

    #[test]
    fn admits_and_counts_empty_fragments() {
        let mut filter = FragmentFilter::new();
        assert!(filter.admit(""));
        assert!(filter.admit(""));
        assert!(filter.admit("\n"));
    }
}
