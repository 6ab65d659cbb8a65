//!
//! treeacl CLI binary
//! -------------------
//! Inspect and edit per-node role assignments of a tree kept in a JSON
//! snapshot file. Each invocation loads the snapshot, runs one command in its
//! own session and writes the snapshot back if the command changed anything.

use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use tracing_subscriber::{fmt, EnvFilter};

use treeacl::service::{parse_assignments, role_map_to_json};
use treeacl::tree::NodePath;
use treeacl::{tprintln, AccessRoles, AccessRolesService, AclConfig, MemoryRepository, TreeSession};

fn print_usage(program: &str) {
    eprintln!(
        "Usage:\n  {program} [--store <file>] <command> [args]\n\nCommands:\n  get <path> [--effective]   roles assigned at <path> (node must exist); with --effective, inherited roles\n  effective <path>           effective roles for <path>, which may not exist yet\n  set <path> <json>          replace assignments at <path>, e.g. '{{\"alice\":[\"writer\"]}}'\n  delete <path>              remove all assignments at <path>\n  mkdir <path>               create <path> and any missing parents\n  tree                       print the stored tree as JSON\n\nFlags:\n  --store <file>             snapshot file (default: treeacl.json)\n  -h, --help                 show this help\n\nEnvironment:\n  TREEACL_CONFIG             JSON config file (field names, default_roles)\n  TREEACL_DEFAULT_ROLES      inline JSON object overriding default_roles\n  RUST_LOG                   log filter (default: info)"
    );
}

fn arg_path(args: &[String], idx: usize, program: &str) -> NodePath {
    let Some(raw) = args.get(idx) else {
        eprintln!("missing <path>");
        print_usage(program);
        std::process::exit(2);
    };
    match NodePath::parse(raw) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("invalid path '{}': {}", raw, e);
            std::process::exit(2);
        }
    }
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .context("invalid log filter")?;
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let mut args: Vec<String> = env::args().collect();
    let program = args.remove(0);

    let mut store = PathBuf::from("treeacl.json");
    let mut rest: Vec<String> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--store" => {
                if i + 1 >= args.len() { eprintln!("--store requires a value"); print_usage(&program); std::process::exit(2); }
                store = PathBuf::from(&args[i + 1]);
                i += 2; continue;
            }
            "-h" | "--help" => { print_usage(&program); return Ok(()); }
            _ => { rest.push(args[i].clone()); i += 1; }
        }
    }
    let Some(cmd) = rest.first().cloned() else {
        print_usage(&program);
        std::process::exit(2);
    };

    let cfg = AclConfig::from_env().map_err(|e| anyhow!("config: {}", e))?;
    let repo = MemoryRepository::load_snapshot(&store).with_context(|| format!("loading {}", store.display()))?;
    let start_version = repo.version();
    tprintln!("treeacl: store='{}' cmd={} args={:?}", store.display(), cmd, &rest[1..]);
    let svc = AccessRolesService::new(repo, AccessRoles::new(cfg)?);

    match cmd.as_str() {
        "get" => {
            let path = arg_path(&rest, 1, &program);
            let effective = rest.iter().skip(2).any(|a| a == "--effective");
            let out = svc.get(&path, effective)?;
            println!("{}", out.as_ref().map(role_map_to_json).unwrap_or(serde_json::Value::Null));
        }
        "effective" => {
            let path = arg_path(&rest, 1, &program);
            let out = svc.get_effective_for(&path)?;
            println!("{}", out.as_ref().map(role_map_to_json).unwrap_or(serde_json::Value::Null));
        }
        "set" => {
            let path = arg_path(&rest, 1, &program);
            let raw = rest.get(2).ok_or_else(|| anyhow!("set requires a JSON assignment object"))?;
            let data = parse_assignments(raw)?;
            svc.post(&path, &data)?;
        }
        "delete" => {
            let path = arg_path(&rest, 1, &program);
            svc.delete(&path)?;
        }
        "mkdir" => {
            let path = arg_path(&rest, 1, &program);
            let mut session = svc.repository().session();
            session.ensure_path(&path)?;
            session.save()?;
        }
        "tree" => {
            println!("{}", serde_json::to_string_pretty(&svc.repository().snapshot()?)?);
        }
        other => {
            eprintln!("unknown command '{}'", other);
            print_usage(&program);
            std::process::exit(2);
        }
    }

    if svc.repository().version() != start_version {
        svc.repository().save_snapshot(&store).with_context(|| format!("writing {}", store.display()))?;
    }
    Ok(())
}
