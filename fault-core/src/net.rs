use once_cell::sync::Lazy;
use regex::Regex;

static INSTANCE_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"-\d+$").expect("static regex"));

/// Strip a URL down to its host:port part.
pub fn host_and_port_from_url(url: &str) -> &str {
	match url.split_once("://") {
		Some((_, rest)) => rest.split('/').next().unwrap_or(rest),
		None => url,
	}
}

pub fn split_host_port(addr: &str) -> (String, Option<u16>) {
	match addr.rsplit_once(':') {
		Some((host, port)) => match port.parse::<u16>() {
			Ok(port) => (host.to_string(), Some(port)),
			Err(_) => (addr.to_string(), None),
		},
		None => (addr.to_string(), None),
	}
}

/// Extract the logical service id from a compose/swarm style FQDN.
///
/// In Docker the name is `[stack]-[service]-[index].[stack]_[network]`; the
/// stack prefix comes from `STACK_PREFIX` when set, otherwise it is derived
/// from the domain part, and the `-N` instance suffix is dropped.
pub fn service_name_from_fqdn(fqdn: &str, stack_prefix: Option<&str>) -> String {
	let fqdn = fqdn.trim_end_matches('.');
	let mut parts = fqdn.split('.');
	let Some(host) = parts.next() else {
		return fqdn.to_string();
	};
	let derived;
	let prefix = match stack_prefix.filter(|p| !p.is_empty()) {
		Some(p) => p,
		None => {
			let domain = parts.next().unwrap_or("");
			derived = domain.split('_').next().unwrap_or("").to_string();
			&derived
		},
	};
	let without_prefix = if prefix.is_empty() {
		host
	} else {
		host
			.strip_prefix(&format!("{prefix}-"))
			.unwrap_or(host)
	};
	INSTANCE_SUFFIX.replace(without_prefix, "").into_owned()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn strips_stack_prefix_and_instance_suffix() {
		assert_eq!(
			service_name_from_fqdn("shop-payment-2.shop_default", None),
			"payment"
		);
	}

	#[test]
	fn explicit_stack_prefix_wins() {
		assert_eq!(
			service_name_from_fqdn("shop-payment-1.other_net", Some("shop")),
			"payment"
		);
	}

	#[test]
	fn bare_hostname_passes_through() {
		assert_eq!(service_name_from_fqdn("payment", None), "payment");
	}

	#[test]
	fn url_host_port() {
		assert_eq!(host_and_port_from_url("http://api:8080"), "api:8080");
		assert_eq!(host_and_port_from_url("http://api:8080/x/y"), "api:8080");
		assert_eq!(host_and_port_from_url("api:8080"), "api:8080");
		assert_eq!(split_host_port("api:8080"), ("api".to_string(), Some(8080)));
		assert_eq!(split_host_port("api"), ("api".to_string(), None));
	}
}
