// Example: Loading SDK configuration
//
// This example demonstrates how to:
// 1. Load the endpoint, voucher policy and contracts from TOML
// 2. Parse each contract interface and list its entry points

use vouchkit_sdk::interface::ContractInterface;
use vouchkit_sdk::SdkConfig;

const CONFIG: &str = r#"
endpoint = "wss://testnet.example.io"

[voucher]
initial_tokens = 2
initial_blocks = 1200
min_balance = 2

[submission]
finalization_timeout_secs = 60

[[contracts]]
name = "PingWalletLess"
program_id = "0x1c3f0a7d2b9e8c4f5a6b7c8d9e0f1a2b3c4d5e6f708192a3b4c5d6e7f8091a2b"
idl = """
service Ping {
  Ping : () -> str;
  query LastCaller : () -> opt actor_id;
};
"""
"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Pass a path to load a file instead
    let config = match std::env::args().nth(1) {
        Some(path) => SdkConfig::load_from_toml(std::path::Path::new(&path))?,
        None => SdkConfig::from_toml_str(CONFIG)?,
    };

    println!("Endpoint: {}", config.endpoint);
    println!(
        "Vouchers: {} tokens for {} blocks, top up below {}",
        config.voucher.initial_tokens, config.voucher.initial_blocks, config.voucher.min_balance
    );

    for contract in &config.contracts {
        let interface = ContractInterface::parse(&contract.load_idl()?)?;
        println!("{} at {}", contract.name, contract.program_id()?);
        for service in interface.service_names() {
            let schema = interface.service(&service)?;
            println!("  {service}");
            println!("    commands: {:?}", schema.command_names());
            println!("    queries:  {:?}", schema.query_names());
        }
    }

    Ok(())
}
