//! Prompt builder for rendering templates.

use crate::types::{BuiltPrompt, PromptDefinition};
use grounded_core::{AppError, AppResult};
use handlebars::Handlebars;
use std::collections::HashMap;

/// Build a prompt from a definition and input variables.
///
/// Renders the system template (if any) and the user template against the
/// same variables and returns a `BuiltPrompt` ready for LLM execution.
///
/// # Example
/// ```no_run
/// use grounded_prompt::{build_prompt, drafting_prompt};
/// use std::collections::HashMap;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let def = drafting_prompt(None)?;
/// let mut vars = HashMap::new();
/// vars.insert("message".to_string(), "¿Dónde está mi pedido?".to_string());
/// vars.insert("evidence".to_string(), "[order] id=2 status=delayed".to_string());
/// vars.insert("lang".to_string(), "es".to_string());
///
/// let built = build_prompt(&def, vars)?;
/// println!("User prompt: {}", built.user);
/// # Ok(())
/// # }
/// ```
pub fn build_prompt(
    definition: &PromptDefinition,
    variables: HashMap<String, String>,
) -> AppResult<BuiltPrompt> {
    tracing::debug!("Building prompt: {}", definition.id);

    let system = definition
        .system
        .as_deref()
        .map(|template| render_template(template, &variables))
        .transpose()?
        .map(|s| s.trim_end().to_string());

    let user = render_template(&definition.template, &variables)?
        .trim_end()
        .to_string();

    Ok(BuiltPrompt { system, user })
}

/// Render a Handlebars template with variables.
fn render_template(template: &str, variables: &HashMap<String, String>) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Evidence is plain text, not HTML
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    let rendered = handlebars
        .render("prompt", &variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))?;

    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::drafting_prompt;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_render_simple_template() {
        let result = render_template("Question: {{prompt}}", &vars(&[("prompt", "Hello, world!")]));
        assert_eq!(result.unwrap(), "Question: Hello, world!");
    }

    #[test]
    fn test_render_does_not_html_escape() {
        let result = render_template("{{x}}", &vars(&[("x", "stock < 5 & price > 0")]));
        assert_eq!(result.unwrap(), "stock < 5 & price > 0");
    }

    #[test]
    fn test_render_template_missing_variable() {
        // Handlebars renders missing variables as empty string
        let result = render_template("Question: {{missing}}", &HashMap::new());
        assert_eq!(result.unwrap(), "Question: ");
    }

    #[test]
    fn test_render_template_syntax_error() {
        let result = render_template("{{#if}}", &HashMap::new());
        assert!(matches!(result, Err(AppError::Prompt(_))));
    }

    #[test]
    fn test_build_drafting_prompt() {
        let def = drafting_prompt(None).unwrap();
        let built = build_prompt(
            &def,
            vars(&[
                ("message", "pedido"),
                ("evidence", "[order] id=2 status=delayed eta=2025-09-30"),
                ("lang", "es"),
            ]),
        )
        .unwrap();

        let system = built.system.unwrap();
        assert!(system.contains("\"es\""));
        assert!(built.user.starts_with("Customer message:\npedido"));
        assert!(built.user.ends_with("[order] id=2 status=delayed eta=2025-09-30"));
    }

    #[test]
    fn test_build_prompt_without_system() {
        let def = PromptDefinition {
            id: "plain".to_string(),
            title: "Plain".to_string(),
            api_version: "1.0".to_string(),
            system: None,
            template: "Q: {{message}}".to_string(),
        };

        let built = build_prompt(&def, vars(&[("message", "hola")])).unwrap();
        assert!(built.system.is_none());
        assert_eq!(built.user, "Q: hola");
    }
}
