//! `phing`: run targets of an XML build file.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Instant;

use clap::Parser;

use phing_rs::configurator::ProjectConfigurator;
use phing_rs::error::Result;
use phing_rs::project::Project;
use phing_rs::propfile::PropertyFileReader;

#[derive(Parser)]
#[command(author, version, about = "Run targets of a Phing-style XML build file")]
struct Cli {
    /// Build file to use
    #[arg(short = 'f', long = "buildfile", default_value = "build.xml")]
    buildfile: PathBuf,

    /// Set a user property (`-D name=value`)
    #[arg(short = 'D', value_name = "NAME=VALUE")]
    defines: Vec<String>,

    /// Load user properties from a property file (`-D` wins)
    #[arg(long = "propertyfile", value_name = "FILE")]
    propertyfile: Option<PathBuf>,

    /// List the project's targets and exit
    #[arg(short = 'l', long = "list", action = clap::ArgAction::SetTrue)]
    list: bool,

    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::SetTrue)]
    verbose: bool,

    #[arg(short = 'd', long = "debug", action = clap::ArgAction::SetTrue)]
    debug: bool,

    #[arg(short = 'q', long = "quiet", action = clap::ArgAction::SetTrue)]
    quiet: bool,

    /// Targets to run; the project's default target when empty
    targets: Vec<String>,
}

fn init_logging(cli: &Cli) {
    let level = if cli.debug {
        "trace"
    } else if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| match record.level() {
            log::Level::Info => writeln!(buf, "{}", record.args()),
            level => writeln!(buf, "[{level}] {}", record.args()),
        })
        .init();
}

/// `-D name=value` pairs (a bare `-D name` sets an empty value), then the
/// `--propertyfile` entries that `-D` did not already set.
fn apply_user_properties(project: &mut Project, defines: &[String], propertyfile: Option<&Path>) -> Result<()> {
    for define in defines {
        let (name, value) = define.split_once('=').unwrap_or((define.as_str(), ""));
        project.set_user_property(name.trim(), value)?;
    }
    if let Some(file) = propertyfile {
        let loaded = PropertyFileReader::load(file, None)?;
        for (name, value) in loaded.iter() {
            if !project.is_user_property(name) {
                project.set_user_property(name, value.clone())?;
            }
        }
    }
    Ok(())
}

fn exit_status(result: &Result<()>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) => e.status(),
    }
}

fn run(cli: &Cli, project: &mut Project) -> Result<()> {
    apply_user_properties(project, &cli.defines, cli.propertyfile.as_deref())?;

    log::info!("Buildfile: {}", cli.buildfile.display());
    ProjectConfigurator::configure_project(project, &cli.buildfile)?;

    if cli.list {
        print_targets(project);
        return Ok(());
    }
    project.execute_targets(&cli.targets)
}

fn print_targets(project: &Project) {
    let visible: Vec<_> = project.targets().filter(|t| !t.hidden).collect();
    let width = visible.iter().map(|t| t.name.len()).max().unwrap_or(0);
    let rule = "-".repeat(79);

    if let Some(default) = project.default_target() {
        println!("Default target:\n{rule}\n {default}\n");
    }

    println!("Main targets:\n{rule}");
    for target in visible.iter().filter(|t| t.description.is_some()) {
        let description = target.description.as_deref().unwrap_or_default();
        println!(" {:width$}  {description}", target.name);
    }

    println!("\nSubtargets:\n{rule}");
    for target in visible.iter().filter(|t| t.description.is_none()) {
        println!(" {}", target.name);
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);
    let started = Instant::now();

    let mut project = Project::new();
    project.fire_build_started();
    let result = run(&cli, &mut project);
    project.fire_build_finished(result.as_ref().err());

    match &result {
        Ok(()) => println!("\nBUILD FINISHED"),
        Err(e) => eprintln!("\nBUILD FAILED\n{e}"),
    }
    println!("\nTotal time: {:.4} seconds", started.elapsed().as_secs_f64());
    process::exit(exit_status(&result));
}

#[cfg(test)]
mod tests {
    use super::*;
    use phing_rs::error::BuildError;

    fn defines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn defines_become_user_properties() {
        let mut project = Project::new();
        apply_user_properties(&mut project, &defines(&["env=prod", "url=http://x?a=b", "bare"]), None).unwrap();

        assert_eq!(project.property("env").unwrap().as_deref(), Some("prod"));
        assert_eq!(project.property("url").unwrap().as_deref(), Some("http://x?a=b"));
        assert_eq!(project.property("bare").unwrap().as_deref(), Some(""));
        assert!(project.is_user_property("env"));
        assert!(project.is_user_property("bare"));
    }

    #[test]
    fn defines_win_over_the_property_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("user.properties");
        std::fs::write(&file, "env = staging\nregion = eu\n").unwrap();

        let mut project = Project::new();
        apply_user_properties(&mut project, &defines(&["env=prod"]), Some(&file)).unwrap();

        assert_eq!(project.property("env").unwrap().as_deref(), Some("prod"));
        assert_eq!(project.property("region").unwrap().as_deref(), Some("eu"));
        assert!(project.is_user_property("region"));
    }

    #[test]
    fn missing_property_file_is_an_io_error() {
        let mut project = Project::new();
        let err = apply_user_properties(&mut project, &[], Some(Path::new("/no/such/user.properties"))).unwrap_err();
        assert!(matches!(err, BuildError::Io { .. }), "{err:?}");
    }

    #[test]
    fn build_file_cannot_override_defines() {
        let dir = tempfile::tempdir().unwrap();
        let build_file = dir.path().join("build.xml");
        std::fs::write(
            &build_file,
            r#"<project name="cli" default="main">
                 <property name="env" value="dev" override="true"/>
                 <target name="main"/>
               </project>"#,
        )
        .unwrap();

        let mut project = Project::new();
        apply_user_properties(&mut project, &defines(&["env=prod"]), None).unwrap();
        ProjectConfigurator::configure_project(&mut project, &build_file).unwrap();
        project.execute_targets(&[]).unwrap();

        assert_eq!(project.property("env").unwrap().as_deref(), Some("prod"));
    }

    #[test]
    fn exit_status_follows_the_error() {
        assert_eq!(exit_status(&Ok(())), 0);
        assert_eq!(exit_status(&Err(BuildError::new("broken"))), 1);
        assert_eq!(exit_status(&Err(BuildError::exit_status("stop", 7))), 7);
    }

    #[test]
    fn cli_parses_defines_and_targets() {
        let cli = Cli::try_parse_from(["phing", "-f", "other.xml", "-D", "a=1", "-Db=2", "-l", "dist", "test"]).unwrap();
        assert_eq!(cli.buildfile, PathBuf::from("other.xml"));
        assert_eq!(cli.defines, defines(&["a=1", "b=2"]));
        assert!(cli.list);
        assert_eq!(cli.targets, defines(&["dist", "test"]));
    }
}
