//! # Router Contact Minting
//!
//! `keygen` creates an Ed25519 identity; `make-rc` signs a router contact
//! with it, stamped with the current time. Used to seed a fresh server and
//! to exercise a deployment end to end.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use bootserv_core::{RouterContactBuilder, RouterId};
use clap::Args;
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;

/// Arguments for `bootserv keygen`.
#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Write the secret key (hex) here instead of printing it.
    #[arg(long)]
    pub out: Option<PathBuf>,
}

/// Arguments for `bootserv make-rc`.
#[derive(Args, Debug)]
pub struct MakeRcArgs {
    /// Identity secret key, 64 hex characters.
    #[arg(long, env = "BOOTSERV_SECRET_KEY_HEX", hide_env_values = true)]
    pub secret_key_hex: String,

    /// Reachability entry to embed. Repeatable.
    #[arg(long = "address", value_name = "ADDR")]
    pub addresses: Vec<String>,

    /// Output file.
    #[arg(long)]
    pub out: PathBuf,
}

/// Execute the keygen subcommand.
pub fn run_keygen(args: &KeygenArgs) -> Result<u8> {
    let key = SigningKey::generate(&mut OsRng);
    let id = RouterId::from_bytes(key.verifying_key().to_bytes());
    let secret = hex::encode(key.to_bytes());

    match &args.out {
        Some(path) => {
            write_secret(path, &secret)?;
            println!("OK: secret key written to {}", path.display());
        }
        None => println!("secret: {secret}"),
    }
    println!("router id: {id}");
    Ok(0)
}

/// Execute the make-rc subcommand.
pub fn run_make_rc(args: &MakeRcArgs) -> Result<u8> {
    let key = parse_secret_key(&args.secret_key_hex)?;
    let mut builder = RouterContactBuilder::new(&key);
    for addr in &args.addresses {
        builder = builder.address(addr.as_bytes().to_vec());
    }
    let rc = builder.sign();
    if rc.len() > bootserv_core::MAX_RC_SIZE {
        bail!(
            "router contact would be {} bytes, limit is {}",
            rc.len(),
            bootserv_core::MAX_RC_SIZE
        );
    }

    std::fs::write(&args.out, &rc)
        .with_context(|| format!("failed to write {}", args.out.display()))?;
    let id = RouterId::from_bytes(key.verifying_key().to_bytes());
    println!("OK: {id} -> {} ({} bytes)", args.out.display(), rc.len());
    Ok(0)
}

/// Parse a 32-byte secret key from hex, ignoring surrounding whitespace.
fn parse_secret_key(text: &str) -> Result<SigningKey> {
    let mut bytes = [0u8; 32];
    hex::decode_to_slice(text.trim(), &mut bytes)
        .context("secret key must be 64 hex characters")?;
    Ok(SigningKey::from_bytes(&bytes))
}

fn write_secret(path: &Path, secret: &str) -> Result<()> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options
        .open(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    std::io::Write::write_all(&mut file, format!("{secret}\n").as_bytes())
        .with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bootserv_core::SignedRcValidator;

    #[test]
    fn keygen_then_make_rc_produces_a_valid_record() {
        let tmp = tempfile::tempdir().unwrap();
        let key_path = tmp.path().join("router.key");
        assert_eq!(run_keygen(&KeygenArgs { out: Some(key_path.clone()) }).unwrap(), 0);

        let secret = std::fs::read_to_string(&key_path).unwrap();
        let out = tmp.path().join("self.signed");
        let code = run_make_rc(&MakeRcArgs {
            secret_key_hex: secret.clone(),
            addresses: vec!["203.0.113.7:1090".into()],
            out: out.clone(),
        })
        .unwrap();
        assert_eq!(code, 0);

        let rc = std::fs::read(&out).unwrap();
        let id = SignedRcValidator::default().check(&rc).unwrap();
        let key = parse_secret_key(&secret).unwrap();
        assert_eq!(id.as_bytes(), key.verifying_key().as_bytes());
    }

    #[test]
    fn keygen_refuses_to_overwrite() {
        let tmp = tempfile::tempdir().unwrap();
        let key_path = tmp.path().join("router.key");
        std::fs::write(&key_path, "existing").unwrap();
        assert!(run_keygen(&KeygenArgs { out: Some(key_path.clone()) }).is_err());
        assert_eq!(std::fs::read_to_string(&key_path).unwrap(), "existing");
    }

    #[test]
    fn bad_secret_key_is_rejected() {
        assert!(parse_secret_key("abc").is_err());
        assert!(parse_secret_key(&"zz".repeat(32)).is_err());
        assert!(parse_secret_key(&"11".repeat(32)).is_ok());
    }
}
