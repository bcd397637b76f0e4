use std::fs;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about = "write the project-guard OpenAPI document", long_about = None)]
struct Args {
    /// Destination file
    #[arg(long, default_value = "openapi.json")]
    out: String,
    /// Port advertised in the `servers` entry
    #[arg(long, default_value_t = 8000)]
    port: u16,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let doc = project_guard::docs::build_openapi(args.port)?;
    let s = serde_json::to_string_pretty(&doc)?;
    fs::write(&args.out, s)?;
    println!("wrote {}", args.out);
    Ok(())
}
