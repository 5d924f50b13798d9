use std::env;
use std::str::FromStr;

/// Read and parse an environment variable, distinguishing "unset" from
/// "set but invalid".
pub fn parse<T: FromStr>(name: &str) -> anyhow::Result<Option<T>>
where
	<T as FromStr>::Err: ToString,
{
	match env::var(name) {
		Ok(val) if val.is_empty() => Ok(None),
		Ok(val) => val
			.parse()
			.map(Some)
			.map_err(|e: <T as FromStr>::Err| {
				anyhow::anyhow!("invalid env var {}={} ({})", name, val, e.to_string())
			}),
		Err(_) => Ok(None),
	}
}

pub fn parse_default<T: FromStr>(name: &str, default: T) -> anyhow::Result<T>
where
	<T as FromStr>::Err: ToString,
{
	parse(name).map(|v| v.unwrap_or(default))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn unset_yields_none() {
		assert_eq!(parse::<u16>("FAULTMESH_TEST_UNSET").unwrap(), None);
	}

	#[test]
	fn invalid_yields_error() {
		// Safety: test-only env mutation, name is unique to this test.
		unsafe { env::set_var("FAULTMESH_TEST_BAD", "nope") };
		assert!(parse::<u16>("FAULTMESH_TEST_BAD").is_err());
	}

	#[test]
	fn default_applies_when_unset() {
		assert_eq!(parse_default("FAULTMESH_TEST_UNSET2", 7u16).unwrap(), 7);
	}
}
