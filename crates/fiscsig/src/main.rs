#![forbid(unsafe_code)]

//! fiscsig CLI: sign and verify tax-filing XML, inspect signing material.

use clap::{ArgAction, Args, Parser, Subcommand};
use fiscsig_core::Error;
use fiscsig_dsig::{SignerOptions, XmlSigner};
use fiscsig_keys::{CertificateData, CertificateManager};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser)]
#[command(
    name = "fiscsig",
    about = "XML digital signatures for tax-filing documents",
    version
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Where the signing material comes from.
#[derive(Args, Debug)]
struct Material {
    /// PKCS#12 container (.p12/.pfx)
    #[arg(long, requires = "password", conflicts_with_all = ["cert", "key"])]
    p12: Option<PathBuf>,

    /// Password for the PKCS#12 container
    #[arg(long)]
    password: Option<String>,

    /// Certificate in PEM format
    #[arg(long, requires = "key")]
    cert: Option<PathBuf>,

    /// Private key in PEM format (PKCS#8 or PKCS#1)
    #[arg(long, requires = "cert")]
    key: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign an XML document with an enveloped signature
    Sign {
        /// Input XML file
        file: PathBuf,

        #[command(flatten)]
        material: Material,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Signer options as JSON
        #[arg(long)]
        options: Option<PathBuf>,

        /// Do not embed the certificate in KeyInfo
        #[arg(long = "no-key-info")]
        no_key_info: bool,
    },

    /// Verify a signed XML document
    Verify {
        /// Input XML file
        file: PathBuf,

        /// Verify against this certificate instead of the embedded one
        #[arg(long)]
        cert: Option<PathBuf>,

        /// Print the verification result as JSON
        #[arg(long)]
        json: bool,

        /// Signer options as JSON
        #[arg(long)]
        options: Option<PathBuf>,

        /// Report policy violations as warnings
        #[arg(long)]
        lenient: bool,

        /// Allowed algorithm URI (replaces the configured list; repeatable)
        #[arg(long = "allow")]
        allow: Vec<String>,
    },

    /// Load signing material and report on the certificate
    Inspect {
        #[command(flatten)]
        material: Material,

        /// Print certificate data and validation as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the certificate embedded in a signed document
    ExtractCert {
        /// Input XML file
        file: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Sign {
            file,
            material,
            output,
            options,
            no_key_info,
        } => cmd_sign(file, material, output, options, no_key_info),

        Commands::Verify {
            file,
            cert,
            json,
            options,
            lenient,
            allow,
        } => cmd_verify(file, cert, json, options, lenient, allow),

        Commands::Inspect { material, json } => cmd_inspect(material, json),

        Commands::ExtractCert { file, output } => cmd_extract_cert(file, output),
    };

    match result {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}

/// Logs go to stderr so signed output on stdout stays clean.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_sign(
    file: PathBuf,
    material: Material,
    output: Option<PathBuf>,
    options: Option<PathBuf>,
    no_key_info: bool,
) -> Result<bool, Error> {
    let xml = read_file(&file)?;
    let mut options = load_options(options.as_deref())?;
    if no_key_info {
        options.include_key_info = false;
    }
    let data = load_material(&CertificateManager::default(), &material)?;

    tracing::debug!(file = %file.display(), "signing");
    let signed = XmlSigner::new(options).sign_with_certificate(&xml, &data)?;
    write_output(output, signed.as_bytes())?;
    Ok(true)
}

fn cmd_verify(
    file: PathBuf,
    cert: Option<PathBuf>,
    json: bool,
    options: Option<PathBuf>,
    lenient: bool,
    allow: Vec<String>,
) -> Result<bool, Error> {
    let xml = read_file(&file)?;
    let options = verify_options(load_options(options.as_deref())?, lenient, allow);
    let signer = XmlSigner::new(options);

    tracing::debug!(file = %file.display(), "verifying");
    let result = match cert {
        Some(path) => signer.verify_with_certificate(&xml, &read_file(&path)?),
        None => signer.verify(&xml),
    };

    if json {
        println!("{}", to_json(&result)?);
    } else {
        println!("{}", if result.valid { "OK" } else { "INVALID" });
        for error in &result.errors {
            println!("  error: {error}");
        }
        for warning in &result.warnings {
            println!("  warning: {warning}");
        }
    }
    Ok(result.valid)
}

#[derive(Serialize)]
struct InspectReport<'a> {
    certificate: &'a CertificateData,
    info: String,
    validation: fiscsig_keys::ValidationResult,
}

fn cmd_inspect(material: Material, json: bool) -> Result<bool, Error> {
    let manager = CertificateManager::default();
    let data = load_material(&manager, &material)?;
    let report = InspectReport {
        certificate: &data,
        info: manager.certificate_info(&data),
        validation: manager.validate_certificate(&data),
    };

    if json {
        println!("{}", to_json(&report)?);
    } else {
        println!("{}", report.info);
        println!("Subject: {}", data.subject);
        println!("Issuer:  {}", data.issuer);
        println!("Valid:   {} to {}", data.valid_from, data.valid_to);
        if report.validation.valid {
            println!("OK");
        } else {
            println!("INVALID");
            for error in &report.validation.errors {
                println!("  error: {error}");
            }
        }
    }
    Ok(report.validation.valid)
}

fn cmd_extract_cert(file: PathBuf, output: Option<PathBuf>) -> Result<bool, Error> {
    let xml = read_file(&file)?;
    let pem = XmlSigner::default()
        .extract_certificate_from_signature(&xml)
        .ok_or_else(|| Error::Other(format!("{}: no usable embedded certificate", file.display())))?;
    write_output(output, pem.as_bytes())?;
    Ok(true)
}

// ── Utility functions ────────────────────────────────────────────────

fn load_options(path: Option<&Path>) -> Result<SignerOptions, Error> {
    match path {
        Some(path) => serde_json::from_str(&read_file(path)?)
            .map_err(|e| Error::Other(format!("{}: {e}", path.display()))),
        None => Ok(SignerOptions::default()),
    }
}

fn verify_options(mut options: SignerOptions, lenient: bool, allow: Vec<String>) -> SignerOptions {
    if lenient {
        options.strict_validation = false;
    }
    if !allow.is_empty() {
        options.allowed_algorithms = allow;
    }
    options
}

fn load_material(manager: &CertificateManager, material: &Material) -> Result<CertificateData, Error> {
    match (&material.p12, &material.cert, &material.key) {
        (Some(p12), _, _) => {
            let password = material.password.as_deref().unwrap_or("");
            manager.load_from_p12(p12, password).ok_or_else(|| {
                Error::Pkcs12(format!("{}: could not load certificate data", p12.display()))
            })
        }
        (None, Some(cert), Some(key)) => manager.load_from_pem(cert, key).ok_or_else(|| {
            Error::Certificate(format!(
                "{} / {}: could not load certificate data",
                cert.display(),
                key.display()
            ))
        }),
        _ => Err(Error::InvalidInput(
            "either --p12 with --password or --cert with --key is required".into(),
        )),
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, Error> {
    serde_json::to_string_pretty(value).map_err(|e| Error::Other(format!("JSON: {e}")))
}

fn read_file(path: &Path) -> Result<String, Error> {
    std::fs::read_to_string(path).map_err(|e| Error::Other(format!("{}: {e}", path.display())))
}

fn write_output(path: Option<PathBuf>, data: &[u8]) -> Result<(), Error> {
    match path {
        Some(p) => std::fs::write(&p, data).map_err(|e| Error::Other(format!("{}: {e}", p.display()))),
        None => {
            use std::io::Write;
            std::io::stdout()
                .write_all(data)
                .map_err(|e| Error::Other(format!("stdout: {e}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(name: &str) -> PathBuf {
        PathBuf::from(format!("{}/../../test-data/keys/{name}", env!("CARGO_MANIFEST_DIR")))
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_sign_with_p12() {
        let cli = Cli::try_parse_from([
            "fiscsig", "-vv", "sign", "in.xml", "--p12", "a.p12", "--password", "pw", "-o", "out.xml",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        let Commands::Sign { material, output, no_key_info, .. } = cli.command else {
            panic!("expected sign");
        };
        assert_eq!(material.p12, Some(PathBuf::from("a.p12")));
        assert_eq!(material.password.as_deref(), Some("pw"));
        assert_eq!(output, Some(PathBuf::from("out.xml")));
        assert!(!no_key_info);
    }

    #[test]
    fn test_parse_rejects_mixed_material() {
        assert!(Cli::try_parse_from([
            "fiscsig", "sign", "in.xml", "--p12", "a.p12", "--password", "pw", "--cert", "c.pem",
            "--key", "k.pem",
        ])
        .is_err());
        assert!(Cli::try_parse_from(["fiscsig", "sign", "in.xml", "--cert", "c.pem"]).is_err());
        assert!(Cli::try_parse_from(["fiscsig", "sign", "in.xml", "--p12", "a.p12"]).is_err());
    }

    #[test]
    fn test_verify_options_overrides() {
        let options = verify_options(SignerOptions::default(), true, vec!["urn:alg".into()]);
        assert!(!options.strict_validation);
        assert_eq!(options.allowed_algorithms, vec!["urn:alg"]);

        let options = verify_options(SignerOptions::default(), false, Vec::new());
        assert_eq!(options, SignerOptions::default());
    }

    #[test]
    fn test_load_options_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("options.json");
        std::fs::write(&path, r#"{"includeKeyInfo": false}"#).unwrap();
        let options = load_options(Some(&path)).unwrap();
        assert!(!options.include_key_info);
        assert!(options.strict_validation);

        std::fs::write(&path, "not json").unwrap();
        assert!(load_options(Some(&path)).is_err());
        assert_eq!(load_options(None).unwrap(), SignerOptions::default());
    }

    #[test]
    fn test_load_material_sources() {
        let manager = CertificateManager::default();
        let from_p12 = load_material(
            &manager,
            &Material {
                p12: Some(fixture("rsa-2048.p12")),
                password: Some("secret123".into()),
                cert: None,
                key: None,
            },
        )
        .unwrap();
        let from_pem = load_material(
            &manager,
            &Material {
                p12: None,
                password: None,
                cert: Some(fixture("rsa-2048-cert.pem")),
                key: Some(fixture("rsa-2048-key.pem")),
            },
        )
        .unwrap();
        assert_eq!(from_p12.subject, from_pem.subject);

        let wrong = Material {
            p12: Some(fixture("rsa-2048.p12")),
            password: Some("nope".into()),
            cert: None,
            key: None,
        };
        assert!(matches!(load_material(&manager, &wrong), Err(Error::Pkcs12(_))));
    }
}
