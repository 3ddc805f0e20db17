//! Recipe prompt construction, mirroring what the web form submits.

pub fn build_recipe_prompt(cuisine: &str, meal_type: &str, ingredients: Option<&str>) -> String {
    let mut prompt = format!("Give me a {meal_type} {cuisine} cooking recipe");

    let ingredient_list = split_ingredients(ingredients.unwrap_or(""));
    if ingredient_list.is_empty() {
        return prompt;
    }

    prompt.push_str(" with the following ingredients: \n");
    for ingredient in ingredient_list {
        prompt.push_str("- ");
        prompt.push_str(&ingredient);
        prompt.push('\n');
    }
    prompt
}

pub fn split_ingredients(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|ingredient| !ingredient.is_empty())
        .map(to_title_case)
        .collect()
}

fn to_title_case(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::{build_recipe_prompt, split_ingredients};

    #[test]
    fn builds_prompt_without_ingredients() {
        assert_eq!(
            build_recipe_prompt("mexican", "vegetarian", None),
            "Give me a vegetarian mexican cooking recipe"
        );
        assert_eq!(
            build_recipe_prompt("italian", "regular", Some("  ")),
            "Give me a regular italian cooking recipe"
        );
    }

    #[test]
    fn builds_prompt_with_ingredient_list() {
        let prompt = build_recipe_prompt("thai", "light", Some("tomato, milk, flour"));
        assert_eq!(
            prompt,
            "Give me a light thai cooking recipe with the following ingredients: \n- Tomato\n- Milk\n- Flour\n"
        );
    }

    #[test]
    fn splits_and_title_cases_ingredients() {
        assert_eq!(
            split_ingredients("tomato,  basil ,mozzarella"),
            vec!["Tomato", "Basil", "Mozzarella"]
        );
        assert_eq!(split_ingredients(""), Vec::<String>::new());
        assert_eq!(split_ingredients(" , ,"), Vec::<String>::new());
    }
}
