//! LM-018: CLI subcommands — init, validate, graph, compile, plan, stack-name.

use crate::core::compiler::{CompiledTemplate, CompilerBuilder};
use crate::core::decorator::{DeploymentContext, Session};
use crate::core::{artifact, identifier, parser, planner, types};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "lamina",
    version,
    about = "Compile declared functions into a least-privilege, dependency-ordered template"
)]
pub struct Cli {
    /// Verbose logging (debug level); RUST_LOG applies otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new lamina project
    Init {
        /// Directory to initialize (default: current)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Validate lamina.yaml without compiling
    Validate {
        /// Path to lamina.yaml
        #[arg(short, long, default_value = "lamina.yaml")]
        file: PathBuf,
    },

    /// Show the validated emission order and each resource's dependencies
    Graph {
        /// Path to lamina.yaml
        #[arg(short, long, default_value = "lamina.yaml")]
        file: PathBuf,
    },

    /// Compile lamina.yaml into a deployment artifact
    Compile {
        /// Path to lamina.yaml
        #[arg(short, long, default_value = "lamina.yaml")]
        file: PathBuf,

        /// Output directory for the artifact
        #[arg(short, long, default_value = "out")]
        out_dir: PathBuf,

        /// Stack scope token (default: config `scope`, then $USER)
        #[arg(long)]
        scope: Option<String>,

        /// Build identifier (default: config `build_id`, then config digest)
        #[arg(long)]
        build_id: Option<String>,

        /// Compile without writing the artifact
        #[arg(long)]
        dry_run: bool,

        /// Account profile handed to decorators
        #[arg(long)]
        profile: Option<String>,

        /// Region handed to decorators
        #[arg(long)]
        region: Option<String>,

        /// Print the artifact to stdout instead of writing it
        #[arg(long)]
        stdout: bool,
    },

    /// Diff a fresh compile against the last written artifact
    Plan {
        /// Path to lamina.yaml
        #[arg(short, long, default_value = "lamina.yaml")]
        file: PathBuf,

        /// Directory holding the previous artifact
        #[arg(short, long, default_value = "out")]
        out_dir: PathBuf,

        /// Stack scope token (default: config `scope`, then $USER)
        #[arg(long)]
        scope: Option<String>,
    },

    /// Print the scoped stack name
    StackName {
        /// Path to lamina.yaml
        #[arg(short, long, default_value = "lamina.yaml")]
        file: PathBuf,

        /// Stack scope token (default: config `scope`, then $USER)
        #[arg(long)]
        scope: Option<String>,
    },

    /// Print the JSON schema of lamina.yaml
    Schema,

    /// Generate shell completions
    Completions {
        /// Target shell
        shell: Shell,
    },
}

/// Compile options shared by `compile`, `plan` and `graph`.
#[derive(Debug, Default)]
struct CompileOpts {
    scope: Option<String>,
    build_id: Option<String>,
    dry_run: bool,
    session: Session,
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands) -> Result<(), String> {
    match cmd {
        Commands::Init { path } => cmd_init(&path),
        Commands::Validate { file } => cmd_validate(&file),
        Commands::Graph { file } => cmd_graph(&file),
        Commands::Compile {
            file,
            out_dir,
            scope,
            build_id,
            dry_run,
            profile,
            region,
            stdout,
        } => cmd_compile(
            &file,
            &out_dir,
            CompileOpts {
                scope,
                build_id,
                dry_run,
                session: Session { profile, region },
            },
            stdout,
        ),
        Commands::Plan {
            file,
            out_dir,
            scope,
        } => cmd_plan(&file, &out_dir, scope),
        Commands::StackName { file, scope } => cmd_stack_name(&file, scope),
        Commands::Schema => cmd_schema(),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "lamina", &mut std::io::stdout());
            Ok(())
        }
    }
}

fn cmd_init(path: &Path) -> Result<(), String> {
    let config_path = path.join("lamina.yaml");
    if config_path.exists() {
        return Err(format!("{} already exists", config_path.display()));
    }
    std::fs::create_dir_all(path)
        .map_err(|e| format!("cannot create {}: {}", path.display(), e))?;

    let template = r#"version: "1.0"
service: my-service
description: "Managed by lamina"

stores:
  AppTable:
    kind: table
    properties:
      BillingMode: PAY_PER_REQUEST

functions:
  GET:
    handler: app::get
    uses: [AppTable]
  PUT:
    handler: app::put
    uses: [AppTable]
    memory: 256
"#;
    std::fs::write(&config_path, template)
        .map_err(|e| format!("cannot write {}: {}", config_path.display(), e))?;

    println!("Initialized lamina project at {}", path.display());
    println!("  Created: {}", config_path.display());
    Ok(())
}

fn cmd_validate(file: &Path) -> Result<(), String> {
    let config = parser::parse_config_file(file)?;
    let errors = parser::validate_config(&config);

    if errors.is_empty() {
        println!(
            "OK: {} ({} functions, {} stores)",
            config.service,
            config.functions.len(),
            config.stores.len()
        );
        Ok(())
    } else {
        for e in &errors {
            eprintln!("  ERROR: {}", e);
        }
        Err(format!("{} validation error(s)", errors.len()))
    }
}

/// Parse and validate a lamina config file, keeping the raw text for the
/// build id digest.
fn parse_and_validate(file: &Path) -> Result<(types::LaminaConfig, String), String> {
    let raw = std::fs::read_to_string(file)
        .map_err(|e| format!("failed to read {}: {}", file.display(), e))?;
    let config = parser::parse_config(&raw)?;
    let errors = parser::validate_config(&config);
    if errors.is_empty() {
        return Ok((config, raw));
    }
    for e in &errors {
        eprintln!("  ERROR: {}", e);
    }
    Err("validation failed".to_string())
}

/// Scope precedence: flag, then config, then the invoking user.
fn resolve_scope(flag: Option<String>, config: &types::LaminaConfig) -> Option<String> {
    flag.or_else(|| config.scope.clone())
        .or_else(|| std::env::var("USER").ok())
        .filter(|s| !s.trim().is_empty())
}

fn stack_name(config: &types::LaminaConfig, scope: Option<String>) -> Result<String, String> {
    let scope = resolve_scope(scope, config);
    identifier::scoped_stack_name(&config.service, scope.as_deref()).map_err(|e| e.to_string())
}

fn compile_config(
    config: &types::LaminaConfig,
    raw: &str,
    opts: CompileOpts,
) -> Result<CompiledTemplate, String> {
    let stack = stack_name(config, opts.scope)?;
    let build_id = parser::build_id(opts.build_id.as_deref(), config, raw);
    let mut ctx = DeploymentContext::new(config.service.clone(), build_id)
        .with_stack_name(stack)
        .with_session(opts.session)
        .with_dry_run(opts.dry_run);
    CompilerBuilder::from_config(config)
        .build()
        .compile(&mut ctx)
        .map_err(|e| e.to_string())
}

fn cmd_graph(file: &Path) -> Result<(), String> {
    let (config, raw) = parse_and_validate(file)?;
    let compiled = compile_config(&config, &raw, CompileOpts::default())?;
    print!("{}", format_graph(&compiled));
    Ok(())
}

fn format_graph(compiled: &CompiledTemplate) -> String {
    let mut out = format!(
        "Emission order: {} ({} resources)\n",
        compiled.stack_name(),
        compiled.len()
    );
    for (i, node) in compiled.resources().enumerate() {
        out.push_str(&format!("  {:>3}. {} ({})", i + 1, node.id, node.kind.type_name()));
        if !node.depends_on.is_empty() {
            out.push_str(&format!(" <- {}", node.depends_on.join(", ")));
        }
        out.push('\n');
    }
    out
}

fn cmd_compile(
    file: &Path,
    out_dir: &Path,
    opts: CompileOpts,
    stdout: bool,
) -> Result<(), String> {
    let (config, raw) = parse_and_validate(file)?;
    let dry_run = opts.dry_run;
    let compiled = compile_config(&config, &raw, opts)?;

    if stdout {
        print!("{}", compiled.to_json_pretty()?);
        return Ok(());
    }

    println!(
        "Compiled {} ({} resources, {} functions, build {})",
        compiled.stack_name(),
        compiled.len(),
        compiled.functions().count(),
        compiled.build_id()
    );
    if dry_run {
        let path = artifact::artifact_path(out_dir, compiled.stack_name());
        println!("  Dry run: {} not written", path.display());
        return Ok(());
    }

    let saved = artifact::save_artifact(out_dir, &compiled)?;
    if saved.changed {
        println!("  Wrote: {} ({})", saved.path.display(), saved.hash);
    } else {
        println!("  Unchanged: {}", saved.path.display());
    }
    Ok(())
}

fn cmd_plan(file: &Path, out_dir: &Path, scope: Option<String>) -> Result<(), String> {
    let (config, raw) = parse_and_validate(file)?;
    let compiled = compile_config(
        &config,
        &raw,
        CompileOpts {
            scope,
            dry_run: true,
            ..CompileOpts::default()
        },
    )?;
    let previous = artifact::load_artifact(out_dir, compiled.stack_name())?;
    let plan = planner::plan(previous.as_ref(), &compiled)?;
    print!("{}", planner::format_plan(&plan));
    Ok(())
}

fn cmd_stack_name(file: &Path, scope: Option<String>) -> Result<(), String> {
    let config = parser::parse_config_file(file)?;
    println!("{}", stack_name(&config, scope)?);
    Ok(())
}

fn cmd_schema() -> Result<(), String> {
    let schema = schemars::schema_for!(types::LaminaConfig);
    let json = serde_json::to_string_pretty(&schema)
        .map_err(|e| format!("serialize error: {}", e))?;
    println!("{}", json);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
version: "1.0"
service: SpartaDDB
scope: ci
stores:
  MyAppTable:
    kind: table
functions:
  GET:
    handler: hello_world::get
    uses: [MyAppTable]
  DELETE:
    handler: hello_world::delete
    uses: [MyAppTable]
"#;

    fn write_config(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("lamina.yaml");
        std::fs::write(&path, body).unwrap();
        path
    }

    fn compile_opts(scope: &str) -> CompileOpts {
        CompileOpts {
            scope: Some(scope.to_string()),
            build_id: Some("b-1".to_string()),
            ..CompileOpts::default()
        }
    }

    #[test]
    fn test_lm018_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_lm018_init() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("test-project");
        cmd_init(&sub).unwrap();
        let config = sub.join("lamina.yaml");
        assert!(config.exists());
        cmd_validate(&config).unwrap();
    }

    #[test]
    fn test_lm018_init_already_exists() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("lamina.yaml"), "exists").unwrap();
        assert!(cmd_init(dir.path()).is_err());
    }

    #[test]
    fn test_lm018_validate_valid() {
        let dir = tempfile::tempdir().unwrap();
        cmd_validate(&write_config(dir.path(), CONFIG)).unwrap();
    }

    #[test]
    fn test_lm018_validate_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_config(dir.path(), "version: \"2.0\"\nservice: \"\"\n");
        let err = cmd_validate(&file).unwrap_err();
        assert_eq!(err, "2 validation error(s)");
    }

    #[test]
    fn test_lm018_scope_precedence() {
        let config = parser::parse_config(CONFIG).unwrap();
        assert_eq!(resolve_scope(Some("alice".into()), &config).as_deref(), Some("alice"));
        assert_eq!(resolve_scope(None, &config).as_deref(), Some("ci"));
        assert_eq!(stack_name(&config, None).unwrap(), "SpartaDDB-ci");
    }

    #[test]
    fn test_lm018_compile_writes_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_config(dir.path(), CONFIG);
        let out = dir.path().join("out");
        cmd_compile(&file, &out, compile_opts("ci"), false).unwrap();

        let artifact = artifact::load_artifact(&out, "SpartaDDB-ci").unwrap().unwrap();
        assert_eq!(artifact["Metadata"]["lamina"]["buildId"], "b-1");
        assert_eq!(
            artifact["Resources"]["HelloWorldGet"]["Type"],
            "AWS::Lambda::Function"
        );
    }

    #[test]
    fn test_lm018_compile_dry_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_config(dir.path(), CONFIG);
        let out = dir.path().join("out");
        let opts = CompileOpts {
            dry_run: true,
            ..compile_opts("ci")
        };
        cmd_compile(&file, &out, opts, false).unwrap();
        assert!(!out.exists());
    }

    #[test]
    fn test_lm018_compile_rejects_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_config(
            dir.path(),
            r#"
version: "1.0"
service: s
functions:
  GET:
    handler: get
    uses: [Nope]
"#,
        );
        let out = dir.path().join("out");
        let err = cmd_compile(&file, &out, compile_opts("ci"), false).unwrap_err();
        assert_eq!(err, "validation failed");
    }

    #[test]
    fn test_lm018_compile_is_reproducible() {
        let config = parser::parse_config(CONFIG).unwrap();
        let a = compile_config(&config, CONFIG, compile_opts("ci")).unwrap();
        let b = compile_config(&config, CONFIG, compile_opts("ci")).unwrap();
        assert_eq!(a.to_json_pretty().unwrap(), b.to_json_pretty().unwrap());

        let derived = compile_config(
            &config,
            CONFIG,
            CompileOpts {
                build_id: None,
                ..compile_opts("ci")
            },
        )
        .unwrap();
        assert_eq!(derived.build_id(), parser::build_id(None, &config, CONFIG));
    }

    #[test]
    fn test_lm018_plan_after_compile_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_config(dir.path(), CONFIG);
        let out = dir.path().join("out");
        cmd_compile(&file, &out, compile_opts("ci"), false).unwrap();
        cmd_plan(&file, &out, Some("ci".into())).unwrap();

        let config = parser::parse_config(CONFIG).unwrap();
        let compiled = compile_config(&config, CONFIG, compile_opts("ci")).unwrap();
        let previous = artifact::load_artifact(&out, "SpartaDDB-ci").unwrap();
        let plan = planner::plan(previous.as_ref(), &compiled).unwrap();
        assert!(!plan.has_changes());
    }

    #[test]
    fn test_lm018_graph_output() {
        let config = parser::parse_config(CONFIG).unwrap();
        let compiled = compile_config(&config, CONFIG, compile_opts("ci")).unwrap();
        let text = format_graph(&compiled);
        assert!(text.starts_with("Emission order: SpartaDDB-ci (5 resources)"));
        assert!(text.contains("1. MyAppTable (AWS::DynamoDB::Table)\n"));
        assert!(text
            .contains("HelloWorldGet (AWS::Lambda::Function) <- HelloWorldGetRole, MyAppTable"));
    }

    #[test]
    fn test_lm018_stack_name_and_schema() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_config(dir.path(), CONFIG);
        cmd_stack_name(&file, Some("dev".into())).unwrap();
        cmd_schema().unwrap();
    }
}
