//! Prompt library: built-in definitions with optional workspace overrides.

use crate::builder::build_prompt;
use crate::defaults::BUILTIN_PROMPTS;
use crate::loader::{list_prompts, load_prompt, parse_prompt};
use crate::types::{BuiltPrompt, PromptDefinition};
use concierge_core::{AppError, AppResult};
use std::collections::HashMap;
use std::path::Path;

/// The set of prompt definitions a session renders from.
///
/// Built once at startup and shared read-only afterwards.
#[derive(Debug, Clone)]
pub struct PromptLibrary {
    prompts: HashMap<String, PromptDefinition>,
}

impl PromptLibrary {
    /// Library containing only the built-in prompts.
    pub fn builtin() -> AppResult<Self> {
        let mut prompts = HashMap::new();
        for (id, yaml) in BUILTIN_PROMPTS {
            let definition = parse_prompt(yaml)
                .map_err(|e| AppError::Prompt(format!("Built-in prompt '{}': {}", id, e)))?;
            prompts.insert((*id).to_string(), definition);
        }
        Ok(Self { prompts })
    }

    /// Built-in prompts with any `.concierge/prompts/<id>.yml` overrides applied.
    ///
    /// Overrides for ids the pipeline does not use are ignored with a warning.
    pub fn load(workspace: &Path) -> AppResult<Self> {
        let mut library = Self::builtin()?;

        for id in list_prompts(workspace)? {
            if !library.prompts.contains_key(&id) {
                tracing::warn!("Ignoring prompt override for unknown id '{}'", id);
                continue;
            }
            let definition = load_prompt(workspace, &id)?;
            library.prompts.insert(id, definition);
        }

        Ok(library)
    }

    /// Look up a definition by id.
    pub fn get(&self, id: &str) -> AppResult<&PromptDefinition> {
        self.prompts
            .get(id)
            .ok_or_else(|| AppError::Prompt(format!("Unknown prompt id: {}", id)))
    }

    /// Render the definition `id` with `variables`.
    pub fn render(&self, id: &str, variables: HashMap<String, String>) -> AppResult<BuiltPrompt> {
        build_prompt(self.get(id)?, variables)
    }

    /// Ids of every prompt in the library, sorted.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.prompts.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::{ANSWER_COMPOSE, ROUTER_CLASSIFY};
    use crate::loader::prompts_dir;
    use std::fs;
    use tempfile::TempDir;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_builtin_library_parses() {
        let library = PromptLibrary::builtin().unwrap();
        assert_eq!(library.ids().len(), BUILTIN_PROMPTS.len());
    }

    #[test]
    fn test_router_prompt_lists_labels() {
        let library = PromptLibrary::builtin().unwrap();
        let built = library
            .render(ROUTER_CLASSIFY, vars(&[("question", "Hello"), ("context", "")]))
            .unwrap();

        assert!(built.user.contains("Message: \"Hello\""));
        assert!(built.user.contains("(none)"));
        for label in ["document", "tabular", "both", "general"] {
            assert!(built.user.contains(label));
        }
    }

    #[test]
    fn test_compose_prompt_marks_missing_evidence() {
        let library = PromptLibrary::builtin().unwrap();
        let built = library
            .render(
                ANSWER_COMPOSE,
                vars(&[
                    ("question", "Why should I buy this?"),
                    ("documents", ""),
                    ("tabular", "products: price: 49.99"),
                    ("pitch", "yes"),
                ]),
            )
            .unwrap();

        assert!(built.system.is_some());
        assert!(built.user.contains("Policy information:\nNone available."));
        assert!(built.user.contains("price: 49.99"));
        assert!(built.user.contains("under 20 words"));
        assert!(!built.user.contains("earlier draft"));
    }

    #[test]
    fn test_workspace_override_replaces_builtin() {
        let dir = TempDir::new().unwrap();
        let prompts = prompts_dir(dir.path());
        fs::create_dir_all(&prompts).unwrap();
        fs::write(
            prompts.join("answer.fallback.yml"),
            r#"
id: answer.fallback
title: Shop Fallback
apiVersion: "1.1"
behavior:
  tone: warm
  style: concise
template: "Say sorry about {{question}}"
output:
  format: text
"#,
        )
        .unwrap();
        fs::write(
            prompts.join("unused.yml"),
            "id: unused\ntitle: x\napiVersion: \"1.0\"\nbehavior: {tone: a, style: b}\ntemplate: t\noutput: {format: text}\n",
        )
        .unwrap();

        let library = PromptLibrary::load(dir.path()).unwrap();
        let def = library.get("answer.fallback").unwrap();
        assert_eq!(def.title, "Shop Fallback");
        assert!(library.get("unused").is_err());
    }

    #[test]
    fn test_unknown_id() {
        let library = PromptLibrary::builtin().unwrap();
        assert!(matches!(
            library.render("nope", HashMap::new()),
            Err(AppError::Prompt(_))
        ));
    }
}
