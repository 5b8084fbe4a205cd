//! Prompt loader for YAML prompt definitions.

use crate::types::PromptDefinition;
use grounded_core::{AppError, AppResult};
use std::path::Path;

/// Built-in grounded drafting prompt, compiled into the binary.
const DRAFTING_PROMPT_YAML: &str = include_str!("../prompts/grounded_draft.yml");

/// Load a prompt definition from a YAML file.
///
/// # Example
/// ```no_run
/// use grounded_prompt::load_prompt;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let prompt = load_prompt(Path::new("prompts/draft.yml"))?;
/// println!("Loaded prompt: {}", prompt.title);
/// # Ok(())
/// # }
/// ```
pub fn load_prompt(path: &Path) -> AppResult<PromptDefinition> {
    tracing::debug!("Loading prompt from: {:?}", path);

    if !path.exists() {
        return Err(AppError::Prompt(format!("Prompt file not found: {:?}", path)));
    }

    let contents = std::fs::read_to_string(path).map_err(|e| {
        AppError::Prompt(format!("Failed to read prompt file {:?}: {}", path, e))
    })?;

    let definition = parse_prompt(&contents)
        .map_err(|e| AppError::Prompt(format!("Invalid prompt file {:?}: {}", path, e)))?;

    tracing::info!("Loaded prompt: {} ({})", definition.id, definition.title);

    Ok(definition)
}

/// The drafting prompt: `override_path` when given, else the built-in one.
pub fn drafting_prompt(override_path: Option<&Path>) -> AppResult<PromptDefinition> {
    match override_path {
        Some(path) => load_prompt(path),
        None => parse_prompt(DRAFTING_PROMPT_YAML),
    }
}

fn parse_prompt(contents: &str) -> AppResult<PromptDefinition> {
    let definition: PromptDefinition = serde_yaml::from_str(contents)
        .map_err(|e| AppError::Prompt(format!("Failed to parse prompt YAML: {}", e)))?;

    // Validate required fields
    validate_prompt(&definition)?;

    Ok(definition)
}

/// Validate a prompt definition.
fn validate_prompt(def: &PromptDefinition) -> AppResult<()> {
    if def.id.is_empty() {
        return Err(AppError::Prompt("Prompt ID cannot be empty".to_string()));
    }

    if def.title.is_empty() {
        return Err(AppError::Prompt("Prompt title cannot be empty".to_string()));
    }

    if def.template.trim().is_empty() {
        return Err(AppError::Prompt(
            "Prompt template cannot be empty".to_string(),
        ));
    }

    // Validate API version format (simple check)
    if !def.api_version.contains('.') {
        return Err(AppError::Prompt(format!(
            "Invalid apiVersion format: {}. Expected format: 'x.y'",
            def.api_version
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_builtin_drafting_prompt() {
        let prompt = drafting_prompt(None).unwrap();
        assert_eq!(prompt.id, "grounded.draft");
        let system = prompt.system.unwrap();
        assert!(system.contains("EVIDENCE"));
        assert!(system.contains("{{lang}}"));
        assert!(prompt.template.contains("{{evidence}}"));
        assert!(prompt.template.contains("{{message}}"));
    }

    #[test]
    fn test_load_override_prompt() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("draft.yml");
        fs::write(
            &path,
            "id: custom.draft\ntitle: Custom\napiVersion: \"1.0\"\nsystem: Be brief.\ntemplate: \"{{message}} / {{evidence}}\"\n",
        )
        .unwrap();

        let prompt = drafting_prompt(Some(&path)).unwrap();
        assert_eq!(prompt.id, "custom.draft");
        assert_eq!(prompt.system.as_deref(), Some("Be brief."));
    }

    #[test]
    fn test_load_nonexistent_prompt() {
        let temp_dir = TempDir::new().unwrap();
        let result = load_prompt(&temp_dir.path().join("missing.yml"));
        assert!(matches!(result, Err(AppError::Prompt(_))));
    }

    #[test]
    fn test_load_invalid_yaml() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("invalid.yml");
        fs::write(&path, "invalid: yaml: content:").unwrap();
        assert!(load_prompt(&path).is_err());
    }

    #[test]
    fn test_reject_empty_template() {
        let yaml = "id: x\ntitle: X\napiVersion: \"1.0\"\ntemplate: \"  \"\n";
        assert!(parse_prompt(yaml).is_err());
    }

    #[test]
    fn test_reject_bad_api_version() {
        let yaml = "id: x\ntitle: X\napiVersion: \"1\"\ntemplate: \"{{message}}\"\n";
        assert!(parse_prompt(yaml).is_err());
    }
}
