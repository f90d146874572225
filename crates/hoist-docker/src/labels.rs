//! Container labels: ownership plus Traefik routing for aliased deployments.

use std::collections::BTreeMap;

use hoist_core::{DEPLOYMENT_LABEL, DeploymentConfig};

/// Certificate resolver referenced by TLS routers.
pub const CERT_RESOLVER: &str = "letsencrypt";

const RATE_LIMIT_AVERAGE: u32 = 100;
const RATE_LIMIT_BURST: u32 = 50;

/// Every label a container of `config` is created with.
pub fn container_labels(config: &DeploymentConfig, network: &str) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(DEPLOYMENT_LABEL.to_string(), config.name.clone());
    labels.extend(proxy_labels(config, network));
    labels
}

/// Traefik router/service labels. Empty when the deployment has no aliases.
pub fn proxy_labels(config: &DeploymentConfig, network: &str) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    if config.aliases.is_empty() {
        return labels;
    }

    let name = &config.name;
    let router = format!("traefik.http.routers.{name}");
    let rule = config
        .aliases
        .iter()
        .map(|host| format!("Host(`{host}`)"))
        .collect::<Vec<_>>()
        .join(" || ");

    labels.insert("traefik.enable".into(), "true".into());
    labels.insert("traefik.docker.network".into(), network.to_string());
    labels.insert(format!("{router}.rule"), rule);

    if config.secure {
        labels.insert(format!("{router}.entrypoints"), "websecure".into());
        labels.insert(format!("{router}.tls"), "true".into());
        labels.insert(format!("{router}.tls.certresolver"), CERT_RESOLVER.into());
    } else {
        labels.insert(format!("{router}.entrypoints"), "web".into());
    }

    if let Some(port) = config.ports.keys().next() {
        labels.insert(
            format!("traefik.http.services.{name}.loadbalancer.server.port"),
            port.to_string(),
        );
    }

    if config.rate_limit {
        let middleware = format!("{name}-ratelimit");
        let prefix = format!("traefik.http.middlewares.{middleware}.ratelimit");
        labels.insert(format!("{prefix}.average"), RATE_LIMIT_AVERAGE.to_string());
        labels.insert(format!("{prefix}.burst"), RATE_LIMIT_BURST.to_string());
        labels.insert(format!("{router}.middlewares"), middleware);
    }

    labels
}
