use crate::config::{ConnectionConfig, DumpConfig, RestoreConfig};
use std::path::Path;
use url::Url;

/// Removes the database path and query string from a connection URI.
pub fn prune_uri(uri: &str) -> String {
    if let Ok(mut url) = Url::parse(uri) {
        if url.has_host() {
            url.set_path("");
            url.set_query(None);
            url.set_fragment(None);
            return url.to_string();
        }
    }

    // Seed lists (`host1:1,host2:2`) do not parse as URLs.
    let (scheme, rest) = uri.split_once("://").unwrap_or(("mongodb", uri));
    let authority = rest.split(['/', '?']).next().unwrap_or(rest);
    format!("{}://{}", scheme, authority)
}

fn push_opt(args: &mut Vec<String>, flag: &str, value: Option<&str>) {
    if let Some(value) = value.filter(|v| !v.is_empty()) {
        args.push(format!("--{}={}", flag, value));
    }
}

fn push_flag(args: &mut Vec<String>, flag: &str, enabled: bool) {
    if enabled {
        args.push(format!("--{}", flag));
    }
}

fn connection_args(args: &mut Vec<String>, conn: &ConnectionConfig) {
    push_opt(args, "host", conn.host.as_deref());
    if let Some(port) = conn.port {
        args.push(format!("--port={}", port));
    }

    let ssl = &conn.ssl;
    push_flag(args, "ssl", ssl.enabled);
    push_opt(args, "sslCAFile", ssl.ca_file.as_deref());
    push_opt(args, "sslPEMKeyFile", ssl.pem_key_file.as_deref());
    push_opt(args, "sslPEMKeyPassword", ssl.pem_key_password.as_deref());
    push_opt(args, "sslCRLFile", ssl.crl_file.as_deref());
    push_flag(args, "sslAllowInvalidCertificates", ssl.allow_invalid_certificates);
    push_flag(args, "sslAllowInvalidHostnames", ssl.allow_invalid_hostnames);
    push_flag(args, "sslFIPSMode", ssl.fips_mode);

    push_opt(args, "username", conn.username.as_deref());
    push_opt(args, "password", conn.password.as_deref());
    push_opt(args, "authenticationDatabase", conn.authentication_database.as_deref());
    push_opt(args, "authenticationMechanism", conn.authentication_mechanism.as_deref());

    if let Some(uri) = conn.uri.as_deref().filter(|u| !u.is_empty()) {
        let uri = if conn.uri_prune { prune_uri(uri) } else { uri.to_string() };
        args.push(format!("--uri={}", uri));
    }
}

/// Arguments for the dump tool writing into `out_dir`.
pub fn dump_args(config: &DumpConfig, out_dir: &Path) -> Vec<String> {
    let mut args = Vec::new();
    push_flag(&mut args, "gzip", config.gzip);
    connection_args(&mut args, &config.connection);
    push_opt(&mut args, "db", config.db.as_deref());
    push_opt(&mut args, "collection", config.collection.as_deref());
    push_opt(&mut args, "query", config.query.as_deref());
    push_opt(&mut args, "readPreference", config.read_preference.as_deref());
    args.extend(config.extra_args.iter().cloned());
    args.push(format!("--out={}", out_dir.display()));
    args
}

/// Arguments for the restore tool reading the extracted archive at `source_dir`.
pub fn restore_args(config: &RestoreConfig, source_dir: &Path) -> Vec<String> {
    let mut args = Vec::new();
    push_flag(&mut args, "gzip", config.gzip);
    push_flag(&mut args, "drop", config.drop);

    let target = match config.dir.as_deref().or(config.db.as_deref()) {
        Some(sub_dir) if !sub_dir.is_empty() => source_dir.join(sub_dir),
        _ => source_dir.to_path_buf(),
    };
    args.push(format!("--dir={}", target.display()));

    connection_args(&mut args, &config.connection);
    push_opt(&mut args, "nsFrom", config.ns_from.as_deref());
    push_opt(&mut args, "nsTo", config.ns_to.as_deref());
    push_flag(&mut args, "dryRun", config.dry_run);
    push_opt(&mut args, "writeConcern", config.write_concern.as_deref());
    args.extend(config.extra_args.iter().cloned());
    args
}

/// Arguments for the shell applying post-restore updates with `script`.
/// The connection URI is passed whole, including its database path.
pub fn shell_args(config: &RestoreConfig, script: &str) -> Vec<String> {
    let conn = &config.connection;
    let mut args = vec!["--quiet".to_string()];

    match conn.uri.as_deref().filter(|u| !u.is_empty()) {
        Some(uri) => args.push(uri.to_string()),
        None => {
            push_opt(&mut args, "host", conn.host.as_deref());
            if let Some(port) = conn.port {
                args.push(format!("--port={}", port));
            }
        }
    }

    let ssl = &conn.ssl;
    push_flag(&mut args, "tls", ssl.enabled);
    push_opt(&mut args, "tlsCAFile", ssl.ca_file.as_deref());
    push_opt(&mut args, "tlsCertificateKeyFile", ssl.pem_key_file.as_deref());
    push_flag(&mut args, "tlsAllowInvalidCertificates", ssl.allow_invalid_certificates);
    push_flag(&mut args, "tlsAllowInvalidHostnames", ssl.allow_invalid_hostnames);

    push_opt(&mut args, "username", conn.username.as_deref());
    push_opt(&mut args, "password", conn.password.as_deref());
    push_opt(&mut args, "authenticationDatabase", conn.authentication_database.as_deref());
    push_opt(&mut args, "authenticationMechanism", conn.authentication_mechanism.as_deref());

    args.push("--eval".to_string());
    args.push(script.to_string());
    args
}
