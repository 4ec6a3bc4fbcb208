//! Scheme descriptor patching.
//!
//! Each scheme gets exactly one shell-script pre-action that copies the
//! flavor's icon set before the build starts. A session over one file moves
//! through [`SchemeState`]:
//!
//! ```text
//! Loaded -> BuildActionFound -> PreActionsSectionReady -> ActionUpserted -> Serialized
//!        \-> BuildActionMissing
//! ```
//!
//! Earlier icon pre-actions are recognised by a signature predicate and
//! replaced, so re-running never stacks duplicates.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::PatchError;
use crate::models::{capitalize_flavor, EditOutcome};
use super::editor::upsert_child;
use super::xml_tree::{Element, XmlDocument};
use super::PatchResult;

pub const DEFAULT_SCRIPT_PATH: &str = "Scripts/copy_appicon.sh";
pub const SCHEME_EXTENSION: &str = "xcscheme";
const SHELL_SCRIPT_ACTION: &str =
    "Xcode.IDEStandardExecutionActionsCore.ExecutionActionType.ShellScriptAction";
const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemeState {
    Loaded,
    BuildActionFound,
    PreActionsSectionReady,
    ActionUpserted,
    Serialized,
    BuildActionMissing,
}

impl fmt::Display for SchemeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SchemeState::Loaded => "loaded",
            SchemeState::BuildActionFound => "build-action-found",
            SchemeState::PreActionsSectionReady => "pre-actions-ready",
            SchemeState::ActionUpserted => "action-upserted",
            SchemeState::Serialized => "serialized",
            SchemeState::BuildActionMissing => "build-action-missing",
        };
        f.write_str(name)
    }
}

/// One scheme file and the flavor its pre-action passes to the script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemeTarget {
    pub path: PathBuf,
    pub flavor: String,
}

impl SchemeTarget {
    pub fn new(path: impl Into<PathBuf>, flavor: impl Into<String>) -> Self {
        SchemeTarget {
            path: path.into(),
            flavor: flavor.into(),
        }
    }

    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }
}

/// The build product a pre-action runs against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryBuildable {
    pub blueprint_identifier: String,
    pub buildable_name: String,
    pub blueprint_name: String,
    pub referenced_container: String,
}

impl Default for PrimaryBuildable {
    fn default() -> Self {
        PrimaryBuildable {
            blueprint_identifier: "97C146ED1CF9000F007C117D".to_string(),
            buildable_name: "Runner.app".to_string(),
            blueprint_name: "Runner".to_string(),
            referenced_container: "container:Runner.xcodeproj".to_string(),
        }
    }
}

impl PrimaryBuildable {
    /// Read a `BuildableReference` element; missing attributes fall back to
    /// the default product.
    pub fn from_element(el: &Element) -> Self {
        let fallback = PrimaryBuildable::default();
        let get = |name: &str, default: String| {
            el.attr(name).map(str::to_string).unwrap_or(default)
        };
        PrimaryBuildable {
            blueprint_identifier: get("BlueprintIdentifier", fallback.blueprint_identifier),
            buildable_name: get("BuildableName", fallback.buildable_name),
            blueprint_name: get("BlueprintName", fallback.blueprint_name),
            referenced_container: get("ReferencedContainer", fallback.referenced_container),
        }
    }

    pub fn to_element(&self) -> Element {
        Element::new("BuildableReference")
            .with_attr("BuildableIdentifier", "primary")
            .with_attr("BlueprintIdentifier", &self.blueprint_identifier)
            .with_attr("BuildableName", &self.buildable_name)
            .with_attr("BlueprintName", &self.blueprint_name)
            .with_attr("ReferencedContainer", &self.referenced_container)
    }
}

/// Predicate recognising a pre-action this tool owns.
pub type Signature = Box<dyn Fn(&Element) -> bool + Send + Sync>;

/// Matches execution actions whose title mentions `AppIcon` or whose script
/// text invokes `script_marker`.
pub fn icon_action_signature(script_marker: impl Into<String>) -> Signature {
    let marker = script_marker.into();
    Box::new(move |el: &Element| {
        let Some(content) = el.find_child("ActionContent") else {
            return false;
        };
        content.attr("title").map_or(false, |t| t.contains("AppIcon"))
            || content
                .attr("scriptText")
                .map_or(false, |s| !marker.is_empty() && s.contains(marker.as_str()))
    })
}

/// Single-quote `word` for a POSIX shell unless it is made only of
/// characters the shell passes through untouched.
pub fn shell_quote(word: &str) -> String {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-.,/:@%+=".contains(c));
    if plain {
        return word.to_string();
    }
    format!("'{}'", word.replace('\'', "'\\''"))
}

/// Content after patching one scheme, with the state the session ended in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemeEdit {
    pub content: String,
    pub outcome: EditOutcome,
    pub state: SchemeState,
}

pub struct SchemePatcher {
    script_path: String,
    fallback_buildable: PrimaryBuildable,
    signature: Signature,
}

impl fmt::Debug for SchemePatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemePatcher")
            .field("script_path", &self.script_path)
            .field("fallback_buildable", &self.fallback_buildable)
            .finish_non_exhaustive()
    }
}

impl Default for SchemePatcher {
    fn default() -> Self {
        SchemePatcher::new(DEFAULT_SCRIPT_PATH)
    }
}

impl SchemePatcher {
    /// Patcher invoking `script_path` (relative to `$SRCROOT`). The default
    /// signature matches on the script's file stem.
    pub fn new(script_path: impl Into<String>) -> Self {
        let script_path = script_path.into();
        let marker = Path::new(&script_path)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("copy_appicon")
            .to_string();
        SchemePatcher {
            script_path,
            fallback_buildable: PrimaryBuildable::default(),
            signature: icon_action_signature(marker),
        }
    }

    pub fn with_signature(mut self, signature: Signature) -> Self {
        self.signature = signature;
        self
    }

    pub fn with_fallback_buildable(mut self, buildable: PrimaryBuildable) -> Self {
        self.fallback_buildable = buildable;
        self
    }

    pub fn script_path(&self) -> &str {
        &self.script_path
    }

    pub fn title_for(flavor: &str) -> String {
        format!("Copy AppIcon for {}", flavor)
    }

    /// Shell line run by the pre-action. The flavor is always a single
    /// argument, quoted when it is not a plain word.
    pub fn script_text_for(&self, flavor: &str) -> String {
        format!(
            "cd \"${{SRCROOT}}\"\n${{SRCROOT}}/{} {}",
            self.script_path,
            shell_quote(flavor)
        )
    }

    /// The execution action entry for `flavor`.
    pub fn action_for(&self, flavor: &str, buildable: &PrimaryBuildable) -> Element {
        Element::new("ExecutionAction")
            .with_attr("ActionType", SHELL_SCRIPT_ACTION)
            .with_child(
                Element::new("ActionContent")
                    .with_attr("title", Self::title_for(flavor))
                    .with_attr("scriptText", self.script_text_for(flavor))
                    .with_child(Element::new("EnvironmentBuildable").with_child(buildable.to_element())),
            )
    }

    /// Run one session over `content`.
    ///
    /// When the pre-action is already in place the original text is
    /// returned untouched, whatever its layout.
    pub fn patch_content(&self, path: &Path, content: &str, flavor: &str) -> PatchResult<SchemeEdit> {
        let mut session = Session::new(path);
        let mut doc = XmlDocument::parse(content)?;

        let buildable = doc
            .root
            .find_path(&["BuildAction", "BuildActionEntries", "BuildActionEntry", "BuildableReference"])
            .map(PrimaryBuildable::from_element)
            .unwrap_or_else(|| {
                log::debug!(
                    "[Scheme] {} has no build entry, using {}",
                    path.display(),
                    self.fallback_buildable.buildable_name
                );
                self.fallback_buildable.clone()
            });

        let Some(build_action) = doc.root.find_child_mut("BuildAction") else {
            session.advance(SchemeState::BuildActionMissing);
            return Err(PatchError::StructuralNotFound {
                path: path.to_path_buf(),
                element: "BuildAction".to_string(),
            });
        };
        session.advance(SchemeState::BuildActionFound);

        let (pre_actions, created) = build_action.ensure_child("PreActions", 0);
        if created {
            log::debug!("[Scheme] Created PreActions in {}", path.display());
        }
        session.advance(SchemeState::PreActionsSectionReady);

        let outcome = upsert_child(pre_actions, &*self.signature, self.action_for(flavor, &buildable));
        session.advance(SchemeState::ActionUpserted);

        if outcome == EditOutcome::AlreadyPresent && !created {
            log::info!("[Scheme] {} already copies AppIcon for {}", path.display(), flavor);
            return Ok(SchemeEdit {
                content: content.to_string(),
                outcome,
                state: session.state,
            });
        }

        let serialized = ensure_xml_declaration(&doc.to_xml_string());
        session.advance(SchemeState::Serialized);
        Ok(SchemeEdit {
            content: serialized,
            outcome: EditOutcome::Applied,
            state: session.state,
        })
    }
}

struct Session<'a> {
    path: &'a Path,
    state: SchemeState,
}

impl<'a> Session<'a> {
    fn new(path: &'a Path) -> Self {
        log::debug!("[Scheme] {}: {}", path.display(), SchemeState::Loaded);
        Session {
            path,
            state: SchemeState::Loaded,
        }
    }

    fn advance(&mut self, next: SchemeState) {
        log::debug!("[Scheme] {}: {} -> {}", self.path.display(), self.state, next);
        self.state = next;
    }
}

/// Make sure the text opens with an XML declaration followed by a newline.
pub fn ensure_xml_declaration(text: &str) -> String {
    if !text.starts_with("<?xml") {
        return format!("{}\n{}", XML_DECLARATION, text.trim_start());
    }
    match text.find("?>") {
        Some(end) if !text[end + 2..].starts_with('\n') => {
            format!("{}\n{}", &text[..end + 2], text[end + 2..].trim_start())
        }
        _ => text.to_string(),
    }
}

/// Build the list of scheme targets in `dir`.
///
/// `explicit` targets come first and keep their flavors. Every other
/// `*.xcscheme` file in the directory, sorted by name and not listed in
/// `excluded`, becomes a target whose flavor is the capitalized file stem.
pub fn discover_schemes(
    dir: &Path,
    explicit: &[SchemeTarget],
    excluded: &[String],
) -> PatchResult<Vec<SchemeTarget>> {
    let mut found: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|e| PatchError::io(dir, e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().map_or(false, |ext| ext == SCHEME_EXTENSION))
        .collect();
    found.sort();

    let mut targets: Vec<SchemeTarget> = explicit.to_vec();
    for path in found {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if excluded.iter().any(|x| x == name) {
            log::debug!("[Scheme] Skipping excluded scheme {}", name);
            continue;
        }
        if targets.iter().any(|t| t.file_name() == Some(name)) {
            continue;
        }
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        let flavor = capitalize_flavor(stem);
        if flavor.is_empty() {
            continue;
        }
        log::debug!("[Scheme] Discovered {} -> {}", name, flavor);
        targets.push(SchemeTarget::new(path.clone(), flavor));
    }

    Ok(targets)
}
