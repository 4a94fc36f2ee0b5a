//! Command-line interface for the Fuse compiler

use crate::error::{CompilerError, Result};
use crate::{Compiler, CompilerOptions};
use clap::{Arg, ArgAction, Command};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use walkdir::WalkDir;

/// Project configuration file (`fusec.toml` or `.json`), merged under
/// command-line flags: flags always win.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub out_dir: Option<String>,
    pub minify: Option<bool>,
    pub dev_mode: Option<bool>,
    pub props: Option<HashMap<String, String>>,
}

pub fn load_config(config_path: &str) -> Result<ConfigFile> {
    let content = fs::read_to_string(config_path).map_err(|e| CompilerError::Compile {
        message: format!("config file {}: {}", config_path, e),
    })?;

    if config_path.ends_with(".json") {
        serde_json::from_str(&content).map_err(|e| CompilerError::Compile {
            message: format!("invalid JSON config: {}", e),
        })
    } else if config_path.ends_with(".toml") {
        toml::from_str(&content).map_err(|e| CompilerError::Compile {
            message: format!("invalid TOML config: {}", e),
        })
    } else {
        Err(CompilerError::Compile {
            message: "config file must be .json or .toml format".to_string(),
        })
    }
}

pub struct Cli {
    config: ConfigFile,
    start_time: Instant,
}

impl Cli {
    pub fn new() -> Self {
        Self {
            config: ConfigFile::default(),
            start_time: Instant::now(),
        }
    }

    pub fn run(&mut self) -> Result<()> {
        self.start_time = Instant::now();
        let matches = self.build_cli().get_matches();

        if let Some(config_path) = matches.get_one::<String>("config") {
            self.config = load_config(config_path)?;
            log::info!("loaded configuration from {}", config_path);
        } else if Path::new("fusec.toml").exists() {
            self.config = load_config("fusec.toml")?;
        }

        setup_logging(matches.get_count("verbose"));

        match matches.subcommand() {
            Some(("compile", sub_matches)) => self.handle_compile(sub_matches),
            Some(("build", sub_matches)) => self.handle_build(sub_matches),
            Some(("check", sub_matches)) => self.handle_check(sub_matches),
            _ => {
                println!("No subcommand specified. Use --help for usage information.");
                Ok(())
            }
        }
    }

    fn build_cli(&self) -> Command {
        Command::new(crate::NAME)
            .version(crate::VERSION)
            .about(crate::DESCRIPTION)
            .arg(
                Arg::new("config")
                    .short('c')
                    .long("config")
                    .value_name("FILE")
                    .help("Configuration file path")
                    .action(ArgAction::Set),
            )
            .arg(
                Arg::new("verbose")
                    .short('v')
                    .long("verbose")
                    .help("Increase verbosity (can be used multiple times)")
                    .action(ArgAction::Count),
            )
            .subcommand(
                Command::new("compile")
                    .about("Compile a single .fuse component to HTML, CSS and JS")
                    .arg(Arg::new("input").help("Input .fuse file").required(true).index(1))
                    .arg(Arg::new("out-dir").short('o').long("out-dir").value_name("DIR").help("Output directory (defaults to the input's directory)"))
                    .arg(Arg::new("minify").long("minify").help("Minify all output artifacts").action(ArgAction::SetTrue))
                    .arg(Arg::new("dev").short('d').long("dev").help("Development mode: surface warnings").action(ArgAction::SetTrue))
                    .arg(Arg::new("prop").short('D').long("prop").value_name("NAME=VALUE").help("Override a component constant").action(ArgAction::Append))
                    .arg(Arg::new("stats").long("stats").help("Show output sizes and timing").action(ArgAction::SetTrue)),
            )
            .subcommand(
                Command::new("build")
                    .about("Compile every .fuse file under a directory")
                    .arg(Arg::new("input").help("Input directory").required(true).index(1))
                    .arg(Arg::new("out-dir").short('o').long("out-dir").value_name("DIR").help("Output directory (defaults to the input directory)"))
                    .arg(Arg::new("minify").long("minify").help("Minify all output artifacts").action(ArgAction::SetTrue)),
            )
            .subcommand(
                Command::new("check")
                    .about("Compile without writing output, reporting diagnostics")
                    .arg(Arg::new("input").help("Input .fuse file or directory").required(true).index(1))
                    .arg(Arg::new("recursive").short('r').long("recursive").help("Check all .fuse files in a directory recursively").action(ArgAction::SetTrue)),
            )
    }

    fn options_from(&self, minify: bool, dev: bool, prop_args: Vec<&String>) -> CompilerOptions {
        let mut options = CompilerOptions {
            minify: minify || self.config.minify.unwrap_or(false),
            dev_mode: dev || self.config.dev_mode.unwrap_or(false),
            ..Default::default()
        };

        if let Some(config_props) = &self.config.props {
            for (name, value) in config_props {
                options.props.insert(name.clone(), parse_prop_value(value));
            }
        }
        for prop in prop_args {
            match prop.split_once('=') {
                Some((name, value)) => {
                    options.props.insert(name.to_string(), parse_prop_value(value));
                }
                None => log::warn!("ignoring malformed -D '{}', expected NAME=VALUE", prop),
            }
        }
        options
    }

    fn handle_compile(&self, matches: &clap::ArgMatches) -> Result<()> {
        let input = matches.get_one::<String>("input").unwrap();
        let prop_args: Vec<&String> = matches
            .get_many::<String>("prop")
            .map(|values| values.collect())
            .unwrap_or_default();
        let options = self.options_from(
            matches.get_flag("minify"),
            matches.get_flag("dev"),
            prop_args,
        );
        let dev_mode = options.dev_mode;

        let mut compiler = Compiler::with_options(options);
        let result = compiler.compile_file(input)?;

        let out_dir = self.resolve_out_dir(matches, input);
        let written = write_artifacts(&result, &out_dir)?;
        for path in &written {
            log::info!("wrote {}", path.display());
        }

        if dev_mode {
            for warning in &result.warnings {
                eprintln!("warning: {}", warning);
            }
        }

        if matches.get_flag("stats") {
            println!(
                "html: {} bytes, css: {} bytes, js: {} bytes, {} warning(s), {}ms",
                result.html.len(),
                result.css.len(),
                result.js.len(),
                result.warnings.len(),
                self.start_time.elapsed().as_millis()
            );
        }

        println!("Compiled '{}' ({} artifacts)", input, written.len());
        Ok(())
    }

    fn handle_build(&self, matches: &clap::ArgMatches) -> Result<()> {
        let input = matches.get_one::<String>("input").unwrap();
        let options = self.options_from(matches.get_flag("minify"), false, Vec::new());
        let out_dir = matches
            .get_one::<String>("out-dir")
            .cloned()
            .or_else(|| self.config.out_dir.clone())
            .unwrap_or_else(|| input.clone());

        // One compiler for the whole tree, so the session caches carry
        // across components.
        let mut compiler = Compiler::with_options(options);
        let mut compiled = 0usize;

        for entry in find_fuse_files(input) {
            let path = entry.display().to_string();
            let result = compiler.compile_file(&path)?;
            write_artifacts(&result, Path::new(&out_dir))?;
            compiled += 1;
            log::info!("compiled {}", path);
        }

        println!(
            "Built {} component(s) in {}ms",
            compiled,
            self.start_time.elapsed().as_millis()
        );
        Ok(())
    }

    fn handle_check(&self, matches: &clap::ArgMatches) -> Result<()> {
        let input = matches.get_one::<String>("input").unwrap();
        let recursive = matches.get_flag("recursive");

        let files: Vec<PathBuf> = if Path::new(input).is_dir() {
            if recursive {
                find_fuse_files(input)
            } else {
                fs::read_dir(input)?
                    .filter_map(|entry| entry.ok())
                    .map(|entry| entry.path())
                    .filter(|path| path.extension().map(|e| e == "fuse").unwrap_or(false))
                    .collect()
            }
        } else {
            vec![PathBuf::from(input)]
        };

        let mut compiler = Compiler::new();
        let mut failures = 0usize;
        let mut warning_count = 0usize;
        for file in &files {
            match compiler.compile_file(&file.display().to_string()) {
                Ok(result) => {
                    for warning in &result.warnings {
                        eprintln!("warning: {}", warning);
                    }
                    warning_count += result.warnings.len();
                }
                Err(error) => {
                    eprintln!("error: {}: {}", file.display(), error);
                    failures += 1;
                }
            }
        }

        println!(
            "Checked {} file(s): {} error(s), {} warning(s)",
            files.len(),
            failures,
            warning_count
        );
        if failures > 0 {
            return Err(CompilerError::Compile {
                message: format!("{} component(s) failed to compile", failures),
            });
        }
        Ok(())
    }

    fn resolve_out_dir(&self, matches: &clap::ArgMatches, input: &str) -> PathBuf {
        matches
            .get_one::<String>("out-dir")
            .cloned()
            .or_else(|| self.config.out_dir.clone())
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                Path::new(input)
                    .parent()
                    .unwrap_or_else(|| Path::new("."))
                    .to_path_buf()
            })
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self::new()
    }
}

fn setup_logging(verbosity: u8) {
    let level = match verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    let _ = env_logger::Builder::from_default_env()
        .filter_level(level)
        .try_init();
}

/// `-D name=value` values go through the literal parser; anything that is
/// not a literal is kept as a string.
fn parse_prop_value(value: &str) -> serde_json::Value {
    crate::constants::parse_literal(value)
        .unwrap_or_else(|| serde_json::Value::String(value.to_string()))
}

fn find_fuse_files(root: &str) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().map(|e| e == "fuse").unwrap_or(false))
        .collect();
    files.sort();
    files
}

/// Write `<Name>.html`, `<Name>.css` and `<Name>.js` (non-empty artifacts
/// only) into `out_dir`, creating it as needed.
pub fn write_artifacts(
    result: &crate::CompileResult,
    out_dir: &Path,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(out_dir)?;
    let mut written = Vec::new();
    let artifacts = [
        ("html", &result.html),
        ("css", &result.css),
        ("js", &result.js),
    ];
    for (extension, content) in artifacts {
        if content.trim().is_empty() {
            continue;
        }
        let path = out_dir.join(format!("{}.{}", result.metadata.name, extension));
        fs::write(&path, content)?;
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile_source;
    use tempfile::TempDir;

    #[test]
    fn test_config_merge_flags_win() {
        let cli = Cli {
            config: ConfigFile {
                out_dir: None,
                minify: Some(false),
                dev_mode: Some(true),
                props: Some(HashMap::from([("x".to_string(), "5".to_string())])),
            },
            start_time: Instant::now(),
        };
        let options = cli.options_from(true, false, Vec::new());
        assert!(options.minify);
        assert!(options.dev_mode);
        assert_eq!(options.props["x"], serde_json::json!(5));
    }

    #[test]
    fn test_parse_prop_value_literal_or_string() {
        assert_eq!(parse_prop_value("42"), serde_json::json!(42));
        assert_eq!(parse_prop_value("true"), serde_json::json!(true));
        assert_eq!(parse_prop_value("plain"), serde_json::json!("plain"));
    }

    #[test]
    fn test_load_toml_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fusec.toml");
        fs::write(&path, "minify = true\nout_dir = \"dist\"\n[props]\nx = \"1\"\n").unwrap();
        let config = load_config(path.to_str().unwrap()).unwrap();
        assert_eq!(config.minify, Some(true));
        assert_eq!(config.out_dir.as_deref(), Some("dist"));
        assert_eq!(config.props.unwrap()["x"], "1");
    }

    #[test]
    fn test_write_artifacts_skips_empty() {
        let dir = TempDir::new().unwrap();
        let result = compile_source(
            "<template><p>hi</p></template>",
            "Widget.fuse",
        )
        .unwrap();
        let written = write_artifacts(&result, dir.path()).unwrap();
        let names: Vec<String> = written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert!(names.contains(&"Widget.html".to_string()));
        // No script or style sections: no js/css artifacts.
        assert!(!names.contains(&"Widget.css".to_string()));
    }

    #[test]
    fn test_find_fuse_files_recursive() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("A.fuse"), "<template><p/></template>").unwrap();
        fs::write(dir.path().join("nested/B.fuse"), "<template><p/></template>").unwrap();
        fs::write(dir.path().join("notes.txt"), "skip me").unwrap();
        let files = find_fuse_files(dir.path().to_str().unwrap());
        assert_eq!(files.len(), 2);
    }
}
