// Example: Locking a signless credential for contract storage
//
// This example demonstrates how to:
// 1. Generate a signless credential
// 2. Lock it under a password
// 3. Strip it to the record the keyring service stores
// 4. Restore and unlock it from that record

use vouchkit_sdk::{coded_name, from_contract_format, to_contract_format, CredentialVault, VouchSigner};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let vault = CredentialVault::new();

    // 1. Fresh credential, named after the walletless user
    let name = "alice";
    let credential = vault.generate(Some(name));
    println!("Credential: {} ({})", credential.address(), credential.label());

    // 2. Lock
    let locked = vault.lock(&credential, "password123456")?;
    println!("Locked record:\n{}", serde_json::to_string_pretty(&locked)?);

    // 3. What goes on-chain, keyed by the coded name
    let stored = to_contract_format(&locked);
    println!("Stored under {}:", coded_name(name));
    println!("{}", serde_json::to_string_pretty(&stored)?);

    // 4. Restore with the caller's label and unlock
    let restored = vault.unlock(&from_contract_format(&stored, name), "password123456")?;
    assert_eq!(restored.address(), credential.address());

    let signature = restored.sign_payload(b"hello").await?;
    println!("Restored credential signs: {signature}");

    match vault.unlock(&locked, "wrongpassword1") {
        Err(err) => println!("Wrong password: {err}"),
        Ok(_) => unreachable!("wrong password must not unlock"),
    }

    Ok(())
}
