//! Gateway URL construction.
//!
//! Transaction IDs resolve path-style (`{gateway}/{txid}`); names resolve
//! subdomain-style (`https://{name}.{gateway_host}`), mirroring how ArNS
//! names are served.

use crate::identifier::Identifier;

/// Path-style URL for a transaction ID.
pub fn path_url(gateway: &str, tx_id: &str) -> String {
    format!("{}/{}", gateway.trim_end_matches('/'), tx_id)
}

/// Raw (unrendered) content URL for a transaction ID.
pub fn raw_url(gateway: &str, tx_id: &str) -> String {
    format!("{}/raw/{}", gateway.trim_end_matches('/'), tx_id)
}

/// Subdomain-style URL for an ArNS name on a gateway.
///
/// The gateway's scheme and port are preserved: `https://gw.example:1984`
/// plus `ar-io` becomes `https://ar-io.gw.example:1984`.
pub fn subdomain_url(name: &str, gateway: &str) -> String {
    let gateway = gateway.trim_end_matches('/');
    match gateway.split_once("://") {
        Some((scheme, host)) => format!("{scheme}://{name}.{host}"),
        None => format!("https://{name}.{gateway}"),
    }
}

/// The display URL for a classified identifier on a gateway.
pub fn resolved_url(identifier: &Identifier, gateway: &str) -> String {
    match identifier {
        Identifier::TxId(id) => path_url(gateway, id.as_str()),
        Identifier::ArnsName(name) => subdomain_url(name.as_str(), gateway),
    }
}
