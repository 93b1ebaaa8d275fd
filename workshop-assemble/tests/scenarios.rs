//! Assembly scenarios: one section (or one recipe directory) in, staged
//! artifacts out. Every test runs in its own `TempDir`.

use std::fs;
use std::path::Path;

use rstest::rstest;
use serde_json::Value;
use tempfile::TempDir;
use workshop_assemble::{
    assemble_all_at, build_section, AssembleOptions, BuildContext, BuildError,
};
use workshop_core::{plan, recipe, ConfigMap, ConfigValue, RecipeSection, WorkshopLayout};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Fixture {
    _tmp: TempDir,
    base: std::path::PathBuf,
    out: std::path::PathBuf,
    home: std::path::PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let tmp = TempDir::new().expect("tempdir");
        let base = tmp.path().join("base");
        let out = tmp.path().join("out");
        let home = tmp.path().join("home");
        fs::create_dir_all(&base).expect("mkdir base");
        Self { _tmp: tmp, base, out, home }
    }

    fn write(&self, rel: &str, text: &str) {
        let path = self.base.join(rel);
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(path, text).expect("write source");
    }

    fn ctx(&self, dry_run: bool) -> BuildContext {
        BuildContext::new(&self.base, &self.out, &self.home, dry_run)
    }
}

fn yaml_map(yaml: &str) -> ConfigMap {
    ConfigMap::from(serde_yaml::from_str::<serde_yaml::Mapping>(yaml).expect("yaml"))
}

fn section(yaml: &str) -> RecipeSection {
    RecipeSection::new("/w/recipe.md", 0, yaml_map(yaml))
}

// ---------------------------------------------------------------------------
// 1. agent
// ---------------------------------------------------------------------------

#[test]
fn slice_excludes_text_after_end_marker() {
    let fx = Fixture::new();
    fx.write("src.md", "before\n<!-- slice:one -->SLICED<!-- /slice -->after\n");
    let s = section(
        "name: Demo\ntarget_locations:\n  - path: ~/Demo/AGENTS.md\nsources:\n  - slice: one\n    slice-file: src.md",
    );

    let out = build_section(&fx.ctx(false), &s).expect("build");
    assert_eq!(out.artifacts.len(), 1);
    assert_eq!(out.artifacts[0].relpath, "agent/Demo/AGENTS.md");

    let text = fs::read_to_string(&out.artifacts[0].abspath).expect("read");
    assert!(text.contains("SLICED"));
    assert!(!text.contains("after"));
}

#[test]
fn slice_and_whole_file_are_joined_in_order() {
    let fx = Fixture::new();
    fx.write("src.md", "before\n<!-- slice:one -->\nSLICED\n<!-- /slice -->\nafter\n");
    let s = section(
        "name: Demo\nsources:\n  - slice: one\n    slice-file: src.md\n  - file: .context/src.md",
    );

    let out = build_section(&fx.ctx(false), &s).expect("build");
    let text = fs::read_to_string(&out.artifacts[0].abspath).expect("read");
    assert!(text.starts_with("SLICED\n\nbefore"));
}

#[rstest]
#[case::claude("~/.claude/", "agent/Demo/CLAUDE.md", ".claude/CLAUDE.md")]
#[case::codex("~/.codex/", "agent/Demo/AGENTS.md", ".codex/AGENTS.md")]
fn directory_target_picks_assistant_filename(
    #[case] target: &str,
    #[case] relpath: &str,
    #[case] home_rel: &str,
) {
    let fx = Fixture::new();
    fx.write("a.md", "A\n");
    let s = section(&format!(
        "name: Demo\ntarget_locations:\n  - path: \"{target}\"\nsources:\n  - file: a.md"
    ));

    let out = build_section(&fx.ctx(false), &s).expect("build");
    assert_eq!(out.artifacts[0].relpath, relpath);
    assert_eq!(
        out.artifacts[0].targets,
        vec![fx.home.join(home_rel).to_string_lossy().into_owned()]
    );
}

#[test]
fn colliding_sections_get_suffixed_filenames() {
    let fx = Fixture::new();
    fx.write("a.md", "A\n");
    let text = "# R\n\n```yaml\nname: Demo\nsources:\n  - file: a.md\ntarget_locations:\n  - path: ~/.codex/\n---\nsources:\n  - file: a.md\ntarget_locations:\n  - path: ~/work/\n```\n";
    let sections = recipe::parse_recipe_str(Path::new("/w/recipe.md"), text).expect("parse");

    let ctx = fx.ctx(false);
    let rels: Vec<String> = plan::disambiguate_at(&sections, &fx.home)
        .iter()
        .map(|s| build_section(&ctx, s).expect("build").artifacts[0].relpath.clone())
        .collect();
    assert_eq!(rels, vec!["agent/Demo/AGENTS-section1.md", "agent/Demo/AGENTS-section2.md"]);
}

#[test]
fn injected_disambiguator_is_honoured() {
    let fx = Fixture::new();
    fx.write("a.md", "A\n");
    let s = RecipeSection::new(
        "/w/recipe.md",
        1,
        yaml_map("name: Demo\n_total_sections: 2\n_agent_disambiguator: section2\ntarget_locations:\n  - path: ~/Demo/AGENTS.md\nsources:\n  - file: a.md"),
    );
    let out = build_section(&fx.ctx(false), &s).expect("build");
    assert_eq!(out.artifacts[0].relpath, "agent/Demo/AGENTS-section2.md");
}

#[test]
fn bad_source_items_are_skipped_not_fatal() {
    let fx = Fixture::new();
    fx.write("a.md", "A\n");
    let s = section(
        "name: Demo\nsources:\n  - path: nope.md\n  - file: missing.md\n  - slice: ghost\n    slice-file: a.md\n  - file: a.md",
    );
    let out = build_section(&fx.ctx(false), &s).expect("build");
    assert_eq!(out.skipped.len(), 3);
    assert_eq!(fs::read_to_string(&out.artifacts[0].abspath).expect("read"), "A\n");
}

#[test]
fn empty_content_is_an_error() {
    let fx = Fixture::new();
    let s = section("name: Demo\nsources:\n  - file: missing.md");
    assert!(matches!(
        build_section(&fx.ctx(false), &s),
        Err(BuildError::EmptyContent { .. })
    ));
}

#[test]
fn template_wraps_content() {
    let fx = Fixture::new();
    fx.write("a.md", "BODY\n");
    let s = section("name: Demo\ntemplate: \"# Header\\n\\n{content}\\n\"\nsources:\n  - file: a.md");
    let out = build_section(&fx.ctx(false), &s).expect("build");
    assert_eq!(
        fs::read_to_string(&out.artifacts[0].abspath).expect("read"),
        "# Header\n\nBODY\n"
    );
}

#[test]
fn unknown_format_builds_nothing() {
    let fx = Fixture::new();
    let s = section("name: Demo\noutput_format: widget");
    assert!(matches!(
        build_section(&fx.ctx(false), &s),
        Err(BuildError::UnknownFormat { ref format }) if format == "widget"
    ));
    assert!(!fx.out.exists());
}

#[test]
fn dry_run_returns_metadata_without_writing() {
    let fx = Fixture::new();
    fx.write("a.md", "A\n");
    let s = section("name: Demo\ntarget_locations:\n  - path: ~/.claude/\nsources:\n  - file: a.md");

    let dry = build_section(&fx.ctx(true), &s).expect("dry build");
    assert!(!fx.out.exists());

    let real = build_section(&fx.ctx(false), &s).expect("real build");
    assert_eq!(dry.artifacts, real.artifacts);
    assert!(real.artifacts[0].abspath.exists());
}

// ---------------------------------------------------------------------------
// 2. command
// ---------------------------------------------------------------------------

const MURDER: &str = r#"
name: murder
output_format: command
target_locations:
  - path: ~/.kiro/hooks/murder.kiro.hook
  - path: ~/.claude/commands/murder.md
  - path: ~/.codex/prompts/murder.md
sources:
  kiro_hook:
    - file: prompts/murder.md
  command_md:
    - file: prompts/murder.md
kiro_hook_config:
  enabled: true
  name: Murder Cogitator
  version: "1"
  when:
    type: userTriggered
  then:
    type: askAgent
    prompt: stale text
  shortName: murder
"#;

#[test]
fn command_outputs_hook_and_markdown() {
    let fx = Fixture::new();
    fx.write("prompts/murder.md", "# Murder\n\nDo the thing.\n");

    let out = build_section(&fx.ctx(false), &section(MURDER)).expect("build");
    assert_eq!(out.artifacts.len(), 2);

    let mut rels: Vec<_> = out.artifacts.iter().map(|a| a.relpath.as_str()).collect();
    rels.sort();
    assert_eq!(rels, vec!["command/murder/murder.kiro.hook", "command/murder/murder.md"]);

    let hook = out.artifacts.iter().find(|a| a.relpath.ends_with(".kiro.hook")).expect("hook");
    let md = out.artifacts.iter().find(|a| a.relpath.ends_with(".md")).expect("md");
    assert_eq!(hook.targets.len(), 1);
    assert_eq!(md.targets.len(), 2);
    assert_eq!(hook.deployment_id(), "command/murder/murder.kiro");

    let doc: Value = serde_json::from_str(&fs::read_to_string(&hook.abspath).expect("read"))
        .expect("hook json");
    assert_eq!(doc["then"]["type"], "askAgent");
    assert_eq!(doc["then"]["prompt"], "# Murder\n\nDo the thing.");
    assert_eq!(doc["name"], "Murder Cogitator");
}

#[test]
fn command_inline_sources() {
    let fx = Fixture::new();
    let s = section(
        "name: doc-check\noutput_format: command\ntarget_locations:\n  - path: ~/.kiro/hooks/doc-check.kiro.hook\n  - path: ~/.claude/commands/doc-check.md\nsources:\n  kiro_hook:\n    - inline: INLINE HOOK PROMPT\n  command_md:\n    - inline: \"# Title\\n\\nINLINE MD\"",
    );
    let out = build_section(&fx.ctx(false), &s).expect("build");
    assert_eq!(out.artifacts.len(), 2);

    let hook = out.artifacts.iter().find(|a| a.relpath.ends_with(".kiro.hook")).expect("hook");
    let doc: Value = serde_json::from_str(&fs::read_to_string(&hook.abspath).expect("read"))
        .expect("hook json");
    assert_eq!(doc["then"]["prompt"], "INLINE HOOK PROMPT");
}

#[test]
fn command_role_falls_back_to_other_role() {
    let fx = Fixture::new();
    let s = section(
        "name: c\noutput_format: prompt\ntarget_locations:\n  - path: ~/.kiro/hooks/c.kiro.hook\n  - path: ~/.codex/prompts/c.md\nsources:\n  prompt_md:\n    - inline: SHARED",
    );
    let out = build_section(&fx.ctx(false), &s).expect("build");
    assert_eq!(out.artifacts.len(), 2);
    let hook = out.artifacts.iter().find(|a| a.relpath.ends_with(".kiro.hook")).expect("hook");
    let doc: Value = serde_json::from_str(&fs::read_to_string(&hook.abspath).expect("read"))
        .expect("hook json");
    assert_eq!(doc["then"]["prompt"], "SHARED");
}

#[test]
fn markdown_only_command_builds_no_hook() {
    let fx = Fixture::new();
    let s = section(
        "name: c\noutput_format: command\ntarget_locations:\n  - path: ~/.claude/commands/c.md\nsources:\n  command_md:\n    - inline: MD\n  kiro_hook:\n    - inline: HOOK",
    );
    let out = build_section(&fx.ctx(false), &s).expect("build");
    assert_eq!(out.artifacts.len(), 1);
    assert_eq!(out.artifacts[0].relpath, "command/c/c.md");
    assert!(!fx.out.join("command/c/c.kiro.hook").exists());
}

// ---------------------------------------------------------------------------
// 3. skill / power
// ---------------------------------------------------------------------------

const SKILL: &str = r#"
name: pdf-tools
output_format: skill
description: Reads PDFs
validate_agentskills_spec: true
also_output_as_power: true
target_locations:
  - path: ~/.claude/skills/pdf-tools/
  - path: ~/.kiro/skills/pdf-tools/
sources:
  skill_md:
    - file: skill/body.md
  references:
    - file: skill/guide.md
    - file: skill/table.csv
  scripts:
    - inline: "echo hi"
      output_name: run.sh
"#;

#[test]
fn skill_bundle_and_derived_power() {
    let fx = Fixture::new();
    fx.write("skill/body.md", "Skill body.\n");
    fx.write("skill/guide.md", "Guide.\n");
    fx.write("skill/table.csv", "a,b\n");

    let out = build_section(&fx.ctx(false), &section(SKILL)).expect("build");
    assert_eq!(out.artifacts.len(), 2);

    let skill = &out.artifacts[0];
    assert!(skill.is_dir);
    assert_eq!(skill.relpath, "skill/pdf-tools");
    assert_eq!(skill.targets, vec![fx.home.join(".claude/skills/pdf-tools/").to_string_lossy().into_owned()]);

    let skill_md = fs::read_to_string(fx.out.join("skill/pdf-tools/SKILL.md")).expect("SKILL.md");
    assert!(skill_md.starts_with("---\nname: pdf-tools\ndescription: Reads PDFs\n---\n"));
    assert!(skill_md.ends_with("Skill body.\n"));
    assert!(fx.out.join("skill/pdf-tools/references/guide.md").exists());
    assert!(fx.out.join("skill/pdf-tools/references/table.csv").exists());
    assert_eq!(
        fs::read_to_string(fx.out.join("skill/pdf-tools/scripts/run.sh")).expect("script"),
        "echo hi"
    );

    let power = &out.artifacts[1];
    assert_eq!(power.relpath, "power/pdf-tools");
    assert_eq!(
        power.targets,
        vec![fx.home.join(".kiro/powers/installed/pdf-tools/").to_string_lossy().into_owned()]
    );
    let power_md = fs::read_to_string(fx.out.join("power/pdf-tools/POWER.md")).expect("POWER.md");
    assert!(power_md.contains("derived_from: skill"));
    assert!(power_md.ends_with("Skill body.\n"));
    assert!(fx.out.join("power/pdf-tools/steering/guide.md").exists());
    assert!(!fx.out.join("power/pdf-tools/steering/table.csv").exists());
}

#[rstest]
#[case::uppercase_name("name: PDF-Tools\noutput_format: skill\nvalidate_agentskills_spec: true\nsources:\n  skill_md:\n    - inline: x")]
#[case::spaces("name: pdf tools\noutput_format: skill\nvalidate_agentskills_spec: true\nsources:\n  skill_md:\n    - inline: x")]
fn invalid_skill_is_rejected(#[case] yaml: &str) {
    let fx = Fixture::new();
    let err = build_section(&fx.ctx(false), &section(yaml)).unwrap_err();
    assert!(matches!(err, BuildError::Validation { .. }), "got: {err}");
    assert!(!fx.out.exists());
}

#[test]
fn long_description_is_rejected() {
    let fx = Fixture::new();
    let mut config = yaml_map("name: ok\noutput_format: skill\nvalidate_agentskills_spec: true\nsources:\n  skill_md:\n    - inline: x");
    config.insert("description", ConfigValue::from("d".repeat(1025)));
    let s = RecipeSection::new("/w/recipe.md", 0, config);
    assert!(matches!(
        build_section(&fx.ctx(false), &s),
        Err(BuildError::Validation { .. })
    ));
}

#[test]
fn power_rejects_non_markdown_steering_per_item() {
    let fx = Fixture::new();
    fx.write("p/body.md", "Power body.\n");
    fx.write("p/mcp.json", "{\"mcpServers\": {}}\n");
    fx.write("p/steer.md", "Steer.\n");
    fx.write("p/steer.txt", "Nope.\n");
    let s = section(
        "name: pw\noutput_format: power\ntarget_locations:\n  - path: ~/.kiro/powers/installed/pw/\nsources:\n  power_md:\n    - file: p/body.md\n  mcp_config:\n    - file: p/mcp.json\n  steering_files:\n    - file: p/steer.md\n    - file: p/steer.txt",
    );

    let out = build_section(&fx.ctx(false), &s).expect("build");
    assert_eq!(out.artifacts.len(), 1);
    assert_eq!(out.skipped.len(), 1);
    assert_eq!(
        fs::read_to_string(fx.out.join("power/pw/POWER.md")).expect("POWER.md"),
        "Power body.\n"
    );
    assert_eq!(
        fs::read(fx.out.join("power/pw/mcp.json")).expect("mcp"),
        b"{\"mcpServers\": {}}\n".to_vec()
    );
    assert!(fx.out.join("power/pw/steering/steer.md").exists());
    assert!(!fx.out.join("power/pw/steering/steer.txt").exists());
}

#[test]
fn rebuilt_power_drops_removed_steering_files() {
    let fx = Fixture::new();
    fx.write("p/body.md", "Power body.\n");
    fx.write("p/keep.md", "Keep.\n");
    fx.write("p/old.md", "Old.\n");
    let both = section(
        "name: pw\noutput_format: power\ntarget_locations:\n  - path: ~/.kiro/powers/installed/pw/\nsources:\n  power_md:\n    - file: p/body.md\n  steering_files:\n    - file: p/keep.md\n    - file: p/old.md",
    );
    build_section(&fx.ctx(false), &both).expect("first build");
    assert!(fx.out.join("power/pw/steering/old.md").exists());

    let trimmed = section(
        "name: pw\noutput_format: power\ntarget_locations:\n  - path: ~/.kiro/powers/installed/pw/\nsources:\n  power_md:\n    - file: p/body.md\n  steering_files:\n    - file: p/keep.md",
    );
    build_section(&fx.ctx(true), &trimmed).expect("dry-run build");
    assert!(fx.out.join("power/pw/steering/old.md").exists());

    build_section(&fx.ctx(false), &trimmed).expect("second build");
    assert!(fx.out.join("power/pw/steering/keep.md").exists());
    assert!(!fx.out.join("power/pw/steering/old.md").exists());
}

// ---------------------------------------------------------------------------
// 4. Full run
// ---------------------------------------------------------------------------

#[test]
fn assemble_all_records_manifest_and_survives_bad_recipes() {
    let tmp = TempDir::new().expect("tempdir");
    let root = tmp.path().join("ctx");
    let home = tmp.path().join("home");
    let layout = WorkshopLayout::new(&root);
    fs::create_dir_all(&layout.recipes_dir).expect("mkdir");
    fs::write(root.join("a.md"), "A\n").expect("write");
    fs::write(
        layout.recipes_dir.join("recipe-good.md"),
        "# Good\n\n```yaml\nname: Good\nsources:\n  - file: a.md\ntarget_locations:\n  - path: ~/.claude/\n```\n",
    )
    .expect("write");
    fs::write(layout.recipes_dir.join("recipe-bad.md"), "# No block\n").expect("write");
    fs::write(
        layout.recipes_dir.join("recipe-odd.md"),
        "```yaml\nname: Odd\noutput_format: widget\n```\n",
    )
    .expect("write");

    let report = assemble_all_at(&layout, &home, AssembleOptions::default()).expect("run");
    assert_eq!(report.recipes, 3);
    assert_eq!(report.artifacts.len(), 1);
    assert_eq!(report.failures.len(), 2);

    let manifest = fs::read_to_string(&layout.manifest_path).expect("manifest");
    assert!(manifest.contains("- **agent/Good/CLAUDE**: Last run "));
    assert!(manifest.contains("  - Output: `agent/Good/CLAUDE.md`"));
    assert!(manifest.contains("  - Status: ✓ assembled"));
}

#[test]
fn assemble_all_dry_run_touches_nothing() {
    let tmp = TempDir::new().expect("tempdir");
    let root = tmp.path().join("ctx");
    let layout = WorkshopLayout::new(&root);
    fs::create_dir_all(&layout.recipes_dir).expect("mkdir");
    fs::write(root.join("a.md"), "A\n").expect("write");
    fs::write(
        layout.recipes_dir.join("recipe-good.md"),
        "```yaml\nname: Good\nsources:\n  - file: a.md\n```\n",
    )
    .expect("write");

    let report = assemble_all_at(&layout, tmp.path(), AssembleOptions { dry_run: true }).expect("run");
    assert_eq!(report.artifacts.len(), 1);
    assert!(!layout.output_dir.exists());
    assert!(!layout.manifest_path.exists());
}

#[test]
fn missing_workshop_dir_is_fatal() {
    let tmp = TempDir::new().expect("tempdir");
    let layout = WorkshopLayout::new(tmp.path());
    assert!(matches!(
        assemble_all_at(&layout, tmp.path(), AssembleOptions::default()),
        Err(BuildError::Layout(_))
    ));
}
