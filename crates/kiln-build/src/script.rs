//! Reference driver for a small line-oriented module language.
//!
//! ```text
//! import a, b as c        Medium
//! from pkg import name    High (imports `pkg`)
//!     import lazy         Low, any indented import
//! if TYPE_CHECKING:
//!     import typing_only  ConditionalAnalysisOnly
//! def f(x):               interface line
//! class C:                interface line
//! # error: message        analysis error reported on this line
//! # defer 2               two extra deferred type-check rounds
//! # syntax-error          blocking parse error
//! # parse-error           non-blocking parse error
//! ```
//!
//! The interface of a module is its sorted top-level `def`/`class` lines;
//! editing anything else leaves the interface hash unchanged. The driver
//! records every call so tests can check what the orchestrator asked for,
//! and refuses to type check a module before its dependencies are available.

use blake3::Hasher;
use kiln_config::AnalysisOptions;
use kiln_graph::{CacheMetadata, ImportRecord, ModuleId, ParsedModule, Priority};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::driver::{
    AnalysisDriver, DependencyExtractor, DriverError, ModuleOutput, ModuleSource, ParseError,
    Pass, PassOutcome,
};

/// Parse tree of one script module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptModule {
    pub imports: Vec<ImportRecord>,
    /// Top-level `def`/`class` lines, sorted.
    pub interface: Vec<String>,
    pub errors: Vec<(u32, String)>,
    pub deferred_rounds: u32,
}

impl ScriptModule {
    pub fn interface_hash(&self) -> String {
        let mut hasher = Hasher::new();
        for line in &self.interface {
            hasher.update(line.as_bytes());
            hasher.update(b"\n");
        }
        hasher.finalize().to_hex().to_string()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ScriptPayload {
    module: String,
    interface: Vec<String>,
}

/// One call made by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverEvent {
    Parse(ModuleId),
    Pass(Pass, ModuleId),
    Load(ModuleId),
}

#[derive(Debug, Default)]
pub struct ScriptDriver {
    events: Vec<DriverEvent>,
    materialized: FxHashSet<ModuleId>,
    deferred_calls: FxHashMap<ModuleId, u32>,
    loaded_interfaces: FxHashMap<ModuleId, Vec<String>>,
}

impl ScriptDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse script text on its own.
    pub fn parse_text(id: &ModuleId, text: &str) -> Result<ScriptModule, ParseError> {
        let mut module = ScriptModule::default();
        let mut type_checking = false;

        for (index, line) in text.lines().enumerate() {
            let lineno = index as u32 + 1;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let indented = line.starts_with(char::is_whitespace);

            if let Some(comment) = trimmed.strip_prefix('#') {
                let comment = comment.trim();
                if comment == "syntax-error" {
                    return Err(ParseError::blocking("invalid syntax", Some(lineno)));
                } else if comment == "parse-error" {
                    return Err(ParseError::recoverable("unparsable module", Some(lineno)));
                } else if let Some(message) = comment.strip_prefix("error:") {
                    module.errors.push((lineno, message.trim().to_string()));
                } else if let Some(rounds) = comment.strip_prefix("defer ") {
                    module.deferred_rounds = rounds.trim().parse().map_err(|_| {
                        ParseError::blocking("defer expects a round count", Some(lineno))
                    })?;
                }
                continue;
            }

            if !indented {
                type_checking = trimmed.starts_with("if TYPE_CHECKING");
                if type_checking {
                    continue;
                }
            }
            let priority = match (indented, type_checking) {
                (true, true) => Some(Priority::ConditionalAnalysisOnly),
                (true, false) => Some(Priority::Low),
                _ => None,
            };

            let mut import = |name: &str, toplevel: Priority| -> Result<(), ParseError> {
                let target = ModuleId::new(name).map_err(|e| {
                    ParseError::blocking(format!("invalid module name: {e}"), Some(lineno))
                })?;
                if target != *id {
                    module.imports.push(ImportRecord::new(
                        priority.unwrap_or(toplevel),
                        target,
                        lineno,
                    ));
                }
                Ok(())
            };

            if let Some(rest) = trimmed.strip_prefix("import ") {
                for part in rest.split(',') {
                    let name = part.split(" as ").next().unwrap_or(part).trim();
                    import(name, Priority::Medium)?;
                }
            } else if let Some(rest) = trimmed.strip_prefix("from ") {
                let name = rest.split(" import ").next().unwrap_or(rest).trim();
                import(name, Priority::High)?;
            } else if !indented && (trimmed.starts_with("def ") || trimmed.starts_with("class ")) {
                module.interface.push(trimmed.to_string());
            }
        }

        module.interface.sort();
        Ok(module)
    }

    pub fn events(&self) -> &[DriverEvent] {
        &self.events
    }

    /// Modules parsed, in order.
    pub fn parsed(&self) -> Vec<ModuleId> {
        self.events
            .iter()
            .filter_map(|event| match event {
                DriverEvent::Parse(id) => Some(id.clone()),
                _ => None,
            })
            .collect()
    }

    /// Modules loaded from cache, in order.
    pub fn loaded(&self) -> Vec<ModuleId> {
        self.events
            .iter()
            .filter_map(|event| match event {
                DriverEvent::Load(id) => Some(id.clone()),
                _ => None,
            })
            .collect()
    }

    /// Modules that ran `pass`, in order.
    pub fn ran(&self, pass: Pass) -> Vec<ModuleId> {
        self.events
            .iter()
            .filter_map(|event| match event {
                DriverEvent::Pass(p, id) if *p == pass => Some(id.clone()),
                _ => None,
            })
            .collect()
    }

    /// Interface of a module loaded from cache.
    pub fn loaded_interface(&self, id: &str) -> Option<&[String]> {
        self.loaded_interfaces.get(id).map(Vec::as_slice)
    }

    fn tree<'m>(module: &'m ParsedModule) -> Result<&'m ScriptModule, DriverError> {
        module
            .tree::<ScriptModule>()
            .ok_or_else(|| DriverError::new(module.id().clone(), "not a script module"))
    }
}

impl DependencyExtractor for ScriptDriver {
    fn extract(&self, module: &ParsedModule) -> Vec<ImportRecord> {
        module
            .tree::<ScriptModule>()
            .map(|tree| tree.imports.clone())
            .unwrap_or_default()
    }
}

impl AnalysisDriver for ScriptDriver {
    fn parse(
        &mut self,
        id: &ModuleId,
        source: &ModuleSource,
        _options: &AnalysisOptions,
    ) -> Result<ParsedModule, ParseError> {
        self.events.push(DriverEvent::Parse(id.clone()));
        self.materialized.remove(id);
        self.deferred_calls.remove(id);
        let module = Self::parse_text(id, &source.text)?;
        Ok(ParsedModule::new(id.clone(), module))
    }

    fn run_pass(
        &mut self,
        pass: Pass,
        module: &ParsedModule,
        dependencies: &[ModuleId],
    ) -> Result<PassOutcome, DriverError> {
        let id = module.id().clone();
        let tree = Self::tree(module)?;
        self.events.push(DriverEvent::Pass(pass, id.clone()));

        match pass {
            Pass::SemanticAnalysis => {
                self.materialized.insert(id);
            }
            Pass::TypeCheck => {
                if let Some(missing) = dependencies
                    .iter()
                    .find(|dep| !self.materialized.contains(*dep))
                {
                    return Err(DriverError::new(
                        id,
                        format!("dependency '{missing}' is not available"),
                    ));
                }
            }
            Pass::DeferredTypeCheck => {
                let calls = self.deferred_calls.entry(id).or_insert(0);
                *calls += 1;
                if *calls <= tree.deferred_rounds {
                    return Ok(PassOutcome::MoreWork);
                }
            }
            Pass::SemanticAnalysisFinal | Pass::Finish => {}
        }
        Ok(PassOutcome::Done)
    }

    fn module_output(&mut self, module: &ParsedModule) -> Result<ModuleOutput, DriverError> {
        let tree = Self::tree(module)?;
        let payload = ScriptPayload {
            module: module.id().to_string(),
            interface: tree.interface.clone(),
        };
        let payload = bincode::serialize(&payload)
            .map_err(|e| DriverError::new(module.id().clone(), e.to_string()))?;
        let diagnostics = tree
            .errors
            .iter()
            .map(|(line, message)| {
                Diagnostic::error(DiagnosticKind::Analysis, message.clone())
                    .in_module(module.id().clone())
                    .at_line(Some(*line))
            })
            .collect();

        Ok(ModuleOutput {
            interface_hash: tree.interface_hash(),
            payload,
            diagnostics,
        })
    }

    fn load_from_cache(&mut self, meta: &CacheMetadata, payload: &[u8]) -> Result<(), DriverError> {
        let id = meta.module_id.clone();
        let payload: ScriptPayload = bincode::deserialize(payload)
            .map_err(|e| DriverError::new(id.clone(), format!("unreadable payload: {e}")))?;
        if payload.module != id.as_str() {
            return Err(DriverError::new(
                id,
                format!("payload belongs to '{}'", payload.module),
            ));
        }
        self.events.push(DriverEvent::Load(id.clone()));
        self.materialized.insert(id.clone());
        self.loaded_interfaces.insert(id, payload.interface);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(name: &str) -> ModuleId {
        ModuleId::new(name).unwrap()
    }

    fn imports(text: &str) -> Vec<(Priority, String, u32)> {
        ScriptDriver::parse_text(&id("m"), text)
            .unwrap()
            .imports
            .into_iter()
            .map(|i| (i.priority, i.module.to_string(), i.line))
            .collect()
    }

    #[test]
    fn test_import_priorities() {
        let text = "\
import a, b as bee
from c import thing
def f():
    import d
if TYPE_CHECKING:
    import e
import m
";
        assert_eq!(
            imports(text),
            vec![
                (Priority::Medium, "a".into(), 1),
                (Priority::Medium, "b".into(), 1),
                (Priority::High, "c".into(), 2),
                (Priority::Low, "d".into(), 4),
                (Priority::ConditionalAnalysisOnly, "e".into(), 6),
            ]
        );
    }

    #[test]
    fn test_interface_ignores_bodies() {
        let before = ScriptDriver::parse_text(&id("m"), "def f():\n    return 1\n").unwrap();
        let after = ScriptDriver::parse_text(&id("m"), "def f():\n    return 2\n").unwrap();
        let changed = ScriptDriver::parse_text(&id("m"), "def f(x):\n    return 2\n").unwrap();
        assert_eq!(before.interface_hash(), after.interface_hash());
        assert_ne!(before.interface_hash(), changed.interface_hash());
    }

    #[test]
    fn test_parse_errors() {
        let blocking = ScriptDriver::parse_text(&id("m"), "import a\n# syntax-error\n").unwrap_err();
        assert!(blocking.blocking);
        assert_eq!(blocking.line, Some(2));

        let recoverable = ScriptDriver::parse_text(&id("m"), "# parse-error\n").unwrap_err();
        assert!(!recoverable.blocking);

        let invalid = ScriptDriver::parse_text(&id("m"), "import a..b\n").unwrap_err();
        assert!(invalid.blocking);
    }

    #[test]
    fn test_directives() {
        let module =
            ScriptDriver::parse_text(&id("m"), "# defer 2\n# error: bad thing\n").unwrap();
        assert_eq!(module.deferred_rounds, 2);
        assert_eq!(module.errors, vec![(2, "bad thing".to_string())]);
    }

    #[test]
    fn test_type_check_requires_materialized_dependencies() {
        let mut driver = ScriptDriver::new();
        let parsed = ParsedModule::new(id("m"), ScriptModule::default());
        driver
            .run_pass(Pass::SemanticAnalysis, &parsed, &[id("dep")])
            .unwrap();
        let err = driver
            .run_pass(Pass::TypeCheck, &parsed, &[id("dep")])
            .unwrap_err();
        assert!(err.message.contains("dep"));

        driver.materialized.insert(id("dep"));
        assert_eq!(
            driver
                .run_pass(Pass::TypeCheck, &parsed, &[id("dep")])
                .unwrap(),
            PassOutcome::Done
        );
    }

    #[test]
    fn test_payload_roundtrip_through_cache_load() {
        let mut driver = ScriptDriver::new();
        let tree = ScriptDriver::parse_text(&id("m"), "def f():\n").unwrap();
        let parsed = ParsedModule::new(id("m"), tree);
        let output = driver.module_output(&parsed).unwrap();

        let meta = CacheMetadata {
            module_id: id("m"),
            source_path: "/src/m.py".into(),
            source_mtime: 0,
            source_size: 0,
            dependency_list: vec![],
            dep_priorities: vec![],
            suppressed_list: vec![],
            suppressed_priorities: vec![],
            child_modules: Default::default(),
            options_fingerprint: String::new(),
            interface_hash: output.interface_hash.clone(),
            payload_mtime: 0,
            payload_location: "/cache/m.data.bin".into(),
            tool_version: String::new(),
            ignore_all: false,
        };
        driver.load_from_cache(&meta, &output.payload).unwrap();
        assert_eq!(driver.loaded(), vec![id("m")]);
        assert_eq!(
            driver.loaded_interface("m"),
            Some(&["def f():".to_string()][..])
        );
    }
}
