//! End-to-end tests for the descriptor patchers.
//!
//! Covers the four reference scenarios (scheme without pre-actions, project
//! block lacking the asset key, re-run on patched output, name-prefix
//! decoys) plus idempotence, locality and backup behaviour over real files.

use std::fs;
use std::path::Path;

use proptest::prelude::*;
use tempfile::TempDir;

use super::locator::find_named_blocks;
use super::scheme::{icon_action_signature, SchemeState};
use super::xml_tree::{Element, XmlDocument};
use super::*;
use crate::models::{EditOutcome, FlavorMapping, PatchSummary, TargetStatus};

const SCHEME: &str = include_str!("../../tests/fixtures/ouroPreto.xcscheme");
const PROJECT: &str = include_str!("../../tests/fixtures/project.pbxproj");
const ASSET_LINE: &str = "ASSETCATALOG_COMPILER_APPICON_NAME = \"AppIcon-Demo\";";

fn icon_actions(content: &str) -> Vec<Element> {
    let doc = XmlDocument::parse(content).unwrap();
    let sig = icon_action_signature("copy_appicon");
    doc.root
        .find_path(&["BuildAction", "PreActions"])
        .map(|pre| pre.elements().filter(|e| sig(e)).cloned().collect())
        .unwrap_or_default()
}

/// A configuration block in the project descriptor layout without the asset key
fn config_block(id: &str, name: &str) -> String {
    format!(
        "\t\t{id} /* {name} */ = {{\n\
         \t\t\tisa = XCBuildConfiguration;\n\
         \t\t\tbuildSettings = {{\n\
         \t\t\t\tCLANG_ENABLE_MODULES = YES;\n\
         \t\t\t\tPRODUCT_NAME = \"$(TARGET_NAME)\";\n\
         \t\t\t}};\n\
         \t\t\tname = \"{name}\";\n\
         \t\t}};\n"
    )
}

fn project_with(blocks: &[String]) -> String {
    format!(
        "// !$*UTF8*$!\n{{\n\tobjects = {{\n\n/* Begin XCBuildConfiguration section */\n{}/* End XCBuildConfiguration section */\n\t}};\n}}\n",
        blocks.concat()
    )
}

// Scenario 1
#[test]
fn test_scheme_without_pre_actions_gets_one_action() {
    assert!(!SCHEME.contains("PreActions"));
    let edit = SchemePatcher::default()
        .patch_content(Path::new("ouroPreto.xcscheme"), SCHEME, "OuroPreto")
        .unwrap();

    let actions = icon_actions(&edit.content);
    assert_eq!(actions.len(), 1);
    let content = actions[0].find_child("ActionContent").unwrap();
    assert!(content.attr("title").unwrap().contains("Copy AppIcon for OuroPreto"));
    let script = content.attr("scriptText").unwrap();
    assert_eq!(script.lines().last().unwrap().split_whitespace().last(), Some("OuroPreto"));
    assert!(script.contains("${SRCROOT}/Scripts/copy_appicon.sh OuroPreto"));
}

// Scenario 2
#[test]
fn test_project_block_gets_asset_key_appended() {
    let project = project_with(&[
        config_block("AA01", "Debug-demo"),
        config_block("AA02", "Release-demo"),
    ]);
    let mapping = FlavorMapping::from_pairs([("Debug-demo", "AppIcon-Demo")]);
    let edit = ProjectPatcher::default().patch_content(&project, &mapping).unwrap();

    assert_eq!(edit.targets[0].status, TargetStatus::Applied);
    assert!(edit.content.contains(&format!(
        "\t\t\t\tPRODUCT_NAME = \"$(TARGET_NAME)\";\n\t\t\t\t{}\n\t\t\t}};\n\t\t\tname = \"Debug-demo\";",
        ASSET_LINE
    )));

    // Everything from the next block on is untouched
    let release = config_block("AA02", "Release-demo");
    let tail = &project[project.find(&release).unwrap()..];
    assert!(edit.content.ends_with(tail));
    assert_eq!(edit.content.len(), project.len() + ASSET_LINE.len() + 5);
}

// Scenario 3
#[test]
fn test_rerun_on_patched_project_is_noop() {
    let project = project_with(&[config_block("AA01", "Debug-demo")]);
    let mapping = FlavorMapping::from_pairs([("Debug-demo", "AppIcon-Demo")]);
    let patcher = ProjectPatcher::default();

    let once = patcher.patch_content(&project, &mapping).unwrap();
    let twice = patcher.patch_content(&once.content, &mapping).unwrap();
    assert_eq!(twice.targets[0].status, TargetStatus::AlreadyPresent);
    assert_eq!(twice.content, once.content);
}

// Scenario 4
#[test]
fn test_prefix_named_block_is_not_touched() {
    let extra = config_block("AA02", "Debug-vicosaExtra");
    let project = project_with(&[config_block("AA01", "Debug-vicosa"), extra.clone()]);
    let mapping = FlavorMapping::from_pairs([("Debug-vicosa", "AppIcon-Vicosa")]);
    let edit = ProjectPatcher::default().patch_content(&project, &mapping).unwrap();

    assert_eq!(edit.targets[0].status, TargetStatus::Applied);
    assert!(edit.content.contains(&extra));
    assert_eq!(edit.content.matches("AppIcon-Vicosa").count(), 1);

    let patched = find_named_blocks(&edit.content, "Debug-vicosa").unwrap();
    assert_eq!(patched.len(), 1);
    assert!(patched[0].body(&edit.content).contains("AppIcon-Vicosa"));
}

#[test]
fn test_fixture_prefix_decoy_keeps_its_value() {
    let mapping = FlavorMapping::from_pairs([("Debug-vicosa", "AppIcon-Vicosa")]);
    let edit = ProjectPatcher::default().patch_content(PROJECT, &mapping).unwrap();
    assert!(edit.content.contains("ASSETCATALOG_COMPILER_APPICON_NAME = \"AppIcon-VicosaExtra\";"));
    assert!(edit.content.contains("ASSETCATALOG_COMPILER_APPICON_NAME = \"AppIcon-Vicosa\";"));
}

#[test]
fn test_scheme_deduplicates_decoy_actions() {
    let patcher = SchemePatcher::default();
    let once = patcher
        .patch_content(Path::new("s.xcscheme"), SCHEME, "Old")
        .unwrap();

    // Plant a second copy recognised only by its script path
    let decoy = "         <ExecutionAction\n            ActionType = \"Xcode.IDEStandardExecutionActionsCore.ExecutionActionType.ShellScriptAction\">\n            <ActionContent\n               title = \"Run Script\"\n               scriptText = \"sh Scripts/copy_appicon.sh Older\">\n            </ActionContent>\n         </ExecutionAction>\n";
    let marker = "      </PreActions>";
    let at = once.content.find(marker).unwrap();
    let doubled = format!("{}{}{}", &once.content[..at], decoy, &once.content[at..]);
    assert_eq!(icon_actions(&doubled).len(), 2);

    let edit = patcher
        .patch_content(Path::new("s.xcscheme"), &doubled, "OuroPreto")
        .unwrap();
    let actions = icon_actions(&edit.content);
    assert_eq!(actions.len(), 1);
    assert_eq!(
        actions[0].find_child("ActionContent").unwrap().attr("title"),
        Some("Copy AppIcon for OuroPreto")
    );
}

#[test]
fn test_unrelated_pre_actions_survive() {
    let with_codegen = SCHEME.replace(
        "      <BuildActionEntries>",
        "      <PreActions>\n         <ExecutionAction\n            ActionType = \"Xcode.IDEStandardExecutionActionsCore.ExecutionActionType.ShellScriptAction\">\n            <ActionContent\n               title = \"Run codegen\"\n               scriptText = \"make codegen\">\n            </ActionContent>\n         </ExecutionAction>\n      </PreActions>\n      <BuildActionEntries>",
    );
    let edit = SchemePatcher::default()
        .patch_content(Path::new("s.xcscheme"), &with_codegen, "OuroPreto")
        .unwrap();
    assert!(edit.content.contains("title = \"Run codegen\""));
    assert_eq!(icon_actions(&edit.content).len(), 1);
}

#[test]
fn test_unmodified_scheme_round_trips() {
    let doc = XmlDocument::parse(SCHEME).unwrap();
    assert_eq!(doc.to_xml_string(), SCHEME);
}

#[test]
fn test_patched_scheme_round_trips() {
    let edit = SchemePatcher::default()
        .patch_content(Path::new("s.xcscheme"), SCHEME, "OuroPreto")
        .unwrap();
    assert_eq!(edit.state, SchemeState::Serialized);
    let doc = XmlDocument::parse(&edit.content).unwrap();
    assert_eq!(doc.to_xml_string(), edit.content);
}

#[test]
fn test_patch_files_with_backup_and_restore() {
    let dir = TempDir::new().unwrap();
    let project = dir.path().join("project.pbxproj");
    let scheme = dir.path().join("ouroPreto.xcscheme");
    fs::write(&project, PROJECT).unwrap();
    fs::write(&scheme, SCHEME).unwrap();

    let driver = DescriptorPatcher::new(BackupStore::default());
    let mapping = FlavorMapping::from_pairs([("demo", "AppIcon-Demo")]).configurations(&["Debug", "Release", "Profile"]);

    let project_report = driver.patch_project(&project, &ProjectPatcher::default(), &mapping);
    let scheme_report = driver.patch_scheme(&SchemeTarget::new(&scheme, "OuroPreto"), &SchemePatcher::default());
    assert!(project_report.changed);
    assert!(scheme_report.changed);

    let summary = PatchSummary::from_reports([&project_report, &scheme_report]);
    assert_eq!(summary.files_touched, 2);
    assert_eq!(summary.applied, 3);
    assert_eq!(summary.not_found, 1);

    let project_backup = project_report.backup.clone().unwrap();
    assert_eq!(fs::read_to_string(&project_backup).unwrap(), PROJECT);

    // Second run: nothing to do, nothing written, backup keeps the original
    let patched = fs::read_to_string(&project).unwrap();
    let again = driver.patch_project(&project, &ProjectPatcher::default(), &mapping);
    assert!(!again.changed);
    assert_eq!(again.count(|s| *s == TargetStatus::AlreadyPresent), 2);
    assert_eq!(fs::read_to_string(&project).unwrap(), patched);
    assert_eq!(fs::read_to_string(&project_backup).unwrap(), PROJECT);

    driver.restore(&project).unwrap();
    driver.restore(&scheme).unwrap();
    assert_eq!(fs::read_to_string(&project).unwrap(), PROJECT);
    assert_eq!(fs::read_to_string(&scheme).unwrap(), SCHEME);
}

#[test]
fn test_dry_run_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let project = dir.path().join("project.pbxproj");
    fs::write(&project, PROJECT).unwrap();

    let driver = DescriptorPatcher::new(BackupStore::default()).dry_run(true);
    let mapping = FlavorMapping::from_pairs([("Release-demo", "AppIcon-Demo")]);
    let report = driver.patch_project(&project, &ProjectPatcher::default(), &mapping);

    assert!(report.changed);
    assert_eq!(report.backup, None);
    assert_eq!(fs::read_to_string(&project).unwrap(), PROJECT);
    assert!(!BackupStore::default().backup_path(&project).exists());
}

#[test]
fn test_unwritable_backup_leaves_descriptor_untouched() {
    let dir = TempDir::new().unwrap();
    let project = dir.path().join("project.pbxproj");
    let scheme = dir.path().join("ouroPreto.xcscheme");
    fs::write(&project, PROJECT).unwrap();
    fs::write(&scheme, SCHEME).unwrap();

    let driver = DescriptorPatcher::default();
    fs::create_dir(driver.backups().backup_path(&project)).unwrap();

    let mapping = FlavorMapping::from_pairs([("Debug-demo", "AppIcon-Demo")]);
    let failed = driver.patch_project(&project, &ProjectPatcher::default(), &mapping);
    assert!(failed.error.as_deref().unwrap().contains("Backup failed"));
    assert!(!failed.changed);
    assert_eq!(fs::read_to_string(&project).unwrap(), PROJECT);

    // The next file is still patched
    let next = driver.patch_scheme(&SchemeTarget::new(&scheme, "OuroPreto"), &SchemePatcher::default());
    assert!(next.error.is_none());
    assert!(next.changed);

    let summary = PatchSummary::from_reports([&failed, &next]);
    assert_eq!(summary.files_failed, 1);
    assert_eq!(summary.files_touched, 1);
}

#[test]
fn test_failed_scheme_does_not_stop_the_next() {
    let dir = TempDir::new().unwrap();
    let broken = dir.path().join("broken.xcscheme");
    let good = dir.path().join("ouroPreto.xcscheme");
    fs::write(&broken, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Scheme>\n</Scheme>\n").unwrap();
    fs::write(&good, SCHEME).unwrap();

    let driver = DescriptorPatcher::default();
    let reports = driver.patch_schemes(
        &[
            SchemeTarget::new(&broken, "Broken"),
            SchemeTarget::new(dir.path().join("missing.xcscheme"), "Missing"),
            SchemeTarget::new(&good, "OuroPreto"),
        ],
        &SchemePatcher::default(),
    );

    let summary = PatchSummary::from_reports(&reports);
    assert_eq!(summary.files_failed, 2);
    assert_eq!(summary.files_touched, 1);
    assert!(reports[0].error.as_deref().unwrap().contains("BuildAction"));
    assert!(!driver.backups().backup_path(&broken).exists());
    assert_eq!(
        fs::read_to_string(&broken).unwrap(),
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Scheme>\n</Scheme>\n"
    );
}

#[test]
fn test_write_atomic_replaces_whole_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("project.pbxproj");
    fs::write(&path, "a much longer original body").unwrap();
    write_atomic(&path, b"short").unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), "short");
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
}

proptest! {
    #[test]
    fn prop_project_edit_is_local_and_idempotent(
        flavor in "[a-z][a-zA-Z]{0,8}",
        suffix in "[A-Za-z]{1,5}",
        asset in "[A-Za-z][A-Za-z0-9-]{0,12}",
    ) {
        let target = format!("Debug-{}", flavor);
        let project = project_with(&[
            config_block("AA00", &format!("Debug-x{}", flavor)),
            config_block("AA01", &target),
            config_block("AA02", &format!("{}{}", target, suffix)),
        ]);
        let mapping = FlavorMapping::from_pairs([(target.clone(), asset.clone())]);
        let patcher = ProjectPatcher::default();

        let settings = patcher.locate_settings(&project, &target).unwrap();
        let once = patcher.patch_content(&project, &mapping).unwrap();
        prop_assert_eq!(&once.targets[0].status, &TargetStatus::Applied);

        let kept_tail = project.len() - settings.close;
        prop_assert_eq!(&once.content[..settings.open], &project[..settings.open]);
        prop_assert_eq!(&once.content[once.content.len() - kept_tail..], &project[settings.close..]);

        let twice = patcher.patch_content(&once.content, &mapping).unwrap();
        prop_assert_eq!(&twice.targets[0].status, &TargetStatus::AlreadyPresent);
        prop_assert_eq!(twice.content, once.content);
    }

    #[test]
    fn prop_scheme_patch_is_idempotent(flavor in "[A-Z][a-zA-Z]{0,10}") {
        let patcher = SchemePatcher::default();
        let once = patcher.patch_content(Path::new("p.xcscheme"), SCHEME, &flavor).unwrap();
        let twice = patcher.patch_content(Path::new("p.xcscheme"), &once.content, &flavor).unwrap();
        prop_assert_eq!(twice.outcome, EditOutcome::AlreadyPresent);
        prop_assert_eq!(&twice.content, &once.content);
        prop_assert_eq!(icon_actions(&twice.content).len(), 1);
    }
}
