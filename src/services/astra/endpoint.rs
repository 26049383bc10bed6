use std::fmt;

use uuid::Uuid;

/// Astra DB deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Environment {
    #[default]
    Prod,
    Dev,
    Test,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Prod => "prod",
            Environment::Dev => "dev",
            Environment::Test => "test",
        }
    }

    /// Base URL of the DevOps API for this environment.
    pub fn devops_url(&self) -> &'static str {
        match self {
            Environment::Prod => "https://api.astra.datastax.com",
            Environment::Dev => "https://api.dev.cloud.datastax.com",
            Environment::Test => "https://api.test.cloud.datastax.com",
        }
    }

    fn endpoint_domain(&self) -> &'static str {
        match self {
            Environment::Prod => ".apps.astra.datastax.com",
            Environment::Dev => ".apps.astra-dev.datastax.com",
            Environment::Test => ".apps.astra-test.datastax.com",
        }
    }

    const ALL: [Environment; 3] = [Environment::Prod, Environment::Dev, Environment::Test];
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Components of an Astra DB API endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedApiEndpoint {
    pub database_id: String,
    pub region: String,
    pub environment: Environment,
}

/// Endpoint of the database `database_id` deployed in `region`.
pub fn build_api_endpoint(database_id: &str, region: &str, environment: Environment) -> String {
    format!("https://{database_id}-{region}{}", environment.endpoint_domain())
}

/// Parses `https://<database uuid>-<region>.apps.astra[-dev|-test].datastax.com[/...]`.
///
/// Returns `None` for anything that is not an Astra DB endpoint, e.g. a
/// self-hosted Data API.
pub fn parse_api_endpoint(api_endpoint: &str) -> Option<ParsedApiEndpoint> {
    let rest = api_endpoint.trim().strip_prefix("https://")?;
    let host = rest.split(['/', ':']).next()?;

    let (environment, prefix) = Environment::ALL
        .iter()
        .find_map(|env| host.strip_suffix(env.endpoint_domain()).map(|prefix| (*env, prefix)))?;

    // A UUID is 36 characters long; the region follows after a dash.
    let database_id = prefix.get(..36)?;
    let region = prefix.get(36..)?.strip_prefix('-')?;
    if region.is_empty() || Uuid::parse_str(database_id).is_err() {
        return None;
    }

    Some(ParsedApiEndpoint {
        database_id: database_id.to_string(),
        region: region.to_string(),
        environment,
    })
}
