#[cfg(target_arch = "wasm32")]
fn main() {
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    if let Err(err) = native::run() {
        eprintln!("render_cli error: {err}");
        std::process::exit(1);
    }
}

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use lsys_render::render::OutputFormat;
    use lsys_render::session::Session;
    use std::fs;
    use std::path::{Path, PathBuf};

    const USAGE: &str = r#"render_cli (lsys-render)

USAGE:
  render_cli <obj|ray|ps|bbox> <script> [options]

OPTIONS:
  --contours <path>  Contour gallery file
  --surface <path>   Patch surface file (repeatable; ids follow the order given)
  --wrapped <path>   Wrapped surface file (repeatable)
  --mesh <path>      OBJ mesh file (repeatable)
  --config <path>    XML render settings
  --out <path>       Output file; obj also writes <path>.mtl (required for obj)
  --overwrite        Overwrite existing output files
  -h, --help         Show this help

Without --out, ray, ps and bbox output goes to stdout.
"#;

    pub fn run() -> Result<(), String> {
        let args: Vec<String> = std::env::args().skip(1).collect();
        let mut args = Args::new(args);

        let Some(command) = args.next() else {
            print_usage();
            return Ok(());
        };
        if matches!(command.as_str(), "-h" | "--help" | "help") {
            print_usage();
            return Ok(());
        }
        let format: OutputFormat = command.parse().map_err(|e| format!("{e}\n\n{USAGE}"))?;
        if format == OutputFormat::Display {
            return Err(format!("`{format}` is only available in the web viewer\n\n{USAGE}"));
        }
        let script = args.next().ok_or("missing script path")?;

        let mut session = Session::new();
        let mut out: Option<PathBuf> = None;
        let mut overwrite = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--contours" => {
                    let path = args.value("--contours")?;
                    let count = session.load_contours(&read(&path)?).map_err(|e| format!("{path}: {e}"))?;
                    eprintln!("loaded {count} contours from {path}");
                }
                "--surface" => {
                    let path = args.value("--surface")?;
                    let id = session.load_surface(&read(&path)?).map_err(|e| format!("{path}: {e}"))?;
                    eprintln!("surface {id}: {path}");
                }
                "--wrapped" => {
                    let path = args.value("--wrapped")?;
                    let id = session
                        .load_wrapped_surface(&read(&path)?)
                        .map_err(|e| format!("{path}: {e}"))?;
                    eprintln!("wrapped surface {id}: {path}");
                }
                "--mesh" => {
                    let path = args.value("--mesh")?;
                    let name = Path::new(&path)
                        .file_stem()
                        .map_or_else(|| path.clone(), |s| s.to_string_lossy().into_owned());
                    let id = session.load_mesh(&name, &read(&path)?).map_err(|e| format!("{path}: {e}"))?;
                    eprintln!("mesh {id}: {path}");
                }
                "--config" => {
                    let path = args.value("--config")?;
                    session.load_config(&read(&path)?).map_err(|e| format!("{path}: {e}"))?;
                }
                "--out" => out = Some(PathBuf::from(args.value("--out")?)),
                "--overwrite" => overwrite = true,
                "-h" | "--help" => {
                    print_usage();
                    return Ok(());
                }
                other => return Err(format!("unknown option `{other}`\n\n{USAGE}")),
            }
        }

        let count = session.load_script(&read(&script)?).map_err(|e| format!("{script}: {e}"))?;
        eprintln!("{script}: {count} commands");

        match out {
            Some(path) => {
                check_target(&path, overwrite)?;
                if format == OutputFormat::Obj {
                    check_target(&path.with_extension("mtl"), overwrite)?;
                }
                session
                    .render_to_path(format, &path)
                    .map_err(|e| format!("render {format}: {e}"))?;
                eprintln!("wrote {}", path.display());
            }
            None if format == OutputFormat::Obj => {
                return Err("obj output needs --out (it writes a .mtl alongside)".to_string());
            }
            None => {
                let text = session.render_text(format).map_err(|e| format!("render {format}: {e}"))?;
                print!("{}", text.main);
            }
        }
        Ok(())
    }

    fn print_usage() {
        println!("{USAGE}");
    }

    fn read(path: &str) -> Result<String, String> {
        fs::read_to_string(path).map_err(|e| format!("read {path}: {e}"))
    }

    fn check_target(path: &Path, overwrite: bool) -> Result<(), String> {
        if path.exists() && !overwrite {
            return Err(format!(
                "refusing to overwrite existing file {} (use --overwrite)",
                path.display()
            ));
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| format!("create dir {}: {e}", parent.display()))?;
        }
        Ok(())
    }

    struct Args {
        args: Vec<String>,
        pos: usize,
    }

    impl Args {
        fn new(args: Vec<String>) -> Self {
            Self { args, pos: 0 }
        }

        fn next(&mut self) -> Option<String> {
            let arg = self.args.get(self.pos)?.clone();
            self.pos += 1;
            Some(arg)
        }

        fn value(&mut self, flag: &str) -> Result<String, String> {
            self.next()
                .ok_or_else(|| format!("missing value for {flag}"))
        }
    }
}
