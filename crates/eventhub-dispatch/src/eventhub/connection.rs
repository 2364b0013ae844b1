// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::fmt::Debug;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionStringError {
    #[error("connection string is missing `{0}`")]
    Missing(&'static str),

    #[error("malformed connection string segment `{0}`")]
    MalformedSegment(String),

    #[error("endpoint `{0}` must use the sb:// scheme")]
    InvalidEndpoint(String),
}

/// The parts of an Event Hubs namespace connection string the producer needs.
///
/// `Endpoint=sb://<namespace>.servicebus.windows.net/;SharedAccessKeyName=<name>;SharedAccessKey=<key>[;EntityPath=<hub>]`
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionProperties {
    /// Fully qualified namespace host, without scheme or trailing slash.
    pub host: String,
    pub key_name: String,
    pub key: String,
    pub entity_path: Option<String>,
}

impl FromStr for ConnectionProperties {
    type Err = ConnectionStringError;

    fn from_str(connection_string: &str) -> Result<Self, Self::Err> {
        let mut endpoint = None;
        let mut key_name = None;
        let mut key = None;
        let mut entity_path = None;

        for segment in connection_string.split(';') {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            // keys can contain '=' padding, only split on the first one
            let Some((name, value)) = segment.split_once('=') else {
                return Err(ConnectionStringError::MalformedSegment(segment.to_string()));
            };
            let value = value.trim().to_string();
            match name.trim().to_ascii_lowercase().as_str() {
                "endpoint" => endpoint = Some(value),
                "sharedaccesskeyname" => key_name = Some(value),
                "sharedaccesskey" => key = Some(value),
                "entitypath" => entity_path = Some(value).filter(|v| !v.is_empty()),
                _ => {}
            }
        }

        let endpoint = endpoint
            .filter(|v| !v.is_empty())
            .ok_or(ConnectionStringError::Missing("Endpoint"))?;
        let host = endpoint
            .strip_prefix("sb://")
            .map(|rest| rest.trim_end_matches('/'))
            .filter(|host| !host.is_empty())
            .ok_or_else(|| ConnectionStringError::InvalidEndpoint(endpoint.clone()))?
            .to_string();

        Ok(ConnectionProperties {
            host,
            key_name: key_name
                .filter(|v| !v.is_empty())
                .ok_or(ConnectionStringError::Missing("SharedAccessKeyName"))?,
            key: key
                .filter(|v| !v.is_empty())
                .ok_or(ConnectionStringError::Missing("SharedAccessKey"))?,
            entity_path,
        })
    }
}

impl Debug for ConnectionProperties {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionProperties")
            .field("host", &self.host)
            .field("key_name", &self.key_name)
            .field("entity_path", &self.entity_path)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONNECTION_STRING: &str = "Endpoint=sb://alerts-ns.servicebus.windows.net/;SharedAccessKeyName=RootManageSharedAccessKey;SharedAccessKey=c2VjcmV0LWtleQ==";

    #[test]
    fn test_parse_connection_string() {
        let props: ConnectionProperties = CONNECTION_STRING.parse().unwrap();

        assert_eq!(props.host, "alerts-ns.servicebus.windows.net");
        assert_eq!(props.key_name, "RootManageSharedAccessKey");
        assert_eq!(props.key, "c2VjcmV0LWtleQ==");
        assert_eq!(props.entity_path, None);
    }

    #[test]
    fn test_parse_entity_path_and_case_insensitive_keys() {
        let props: ConnectionProperties =
            "endpoint=sb://ns.example.net;sharedaccesskeyname=send;sharedaccesskey=abc;EntityPath=alerts;"
                .parse()
                .unwrap();

        assert_eq!(props.host, "ns.example.net");
        assert_eq!(props.entity_path.as_deref(), Some("alerts"));
    }

    #[test]
    fn test_missing_parts() {
        assert_eq!(
            "SharedAccessKeyName=a;SharedAccessKey=b".parse::<ConnectionProperties>(),
            Err(ConnectionStringError::Missing("Endpoint"))
        );
        assert_eq!(
            "Endpoint=sb://ns/;SharedAccessKey=b".parse::<ConnectionProperties>(),
            Err(ConnectionStringError::Missing("SharedAccessKeyName"))
        );
        assert_eq!(
            "Endpoint=sb://ns/;SharedAccessKeyName=a;SharedAccessKey=".parse::<ConnectionProperties>(),
            Err(ConnectionStringError::Missing("SharedAccessKey"))
        );
    }

    #[test]
    fn test_invalid_endpoint_scheme() {
        assert!(matches!(
            "Endpoint=https://ns/;SharedAccessKeyName=a;SharedAccessKey=b"
                .parse::<ConnectionProperties>(),
            Err(ConnectionStringError::InvalidEndpoint(_))
        ));
    }

    #[test]
    fn test_malformed_segment() {
        assert_eq!(
            "Endpoint=sb://ns/;garbage".parse::<ConnectionProperties>(),
            Err(ConnectionStringError::MalformedSegment("garbage".to_string()))
        );
    }

    #[test]
    fn test_debug_hides_key() {
        let props: ConnectionProperties = CONNECTION_STRING.parse().unwrap();
        let debug_str = format!("{:?}", props);
        assert!(debug_str.contains("alerts-ns.servicebus.windows.net"));
        assert!(!debug_str.contains("c2VjcmV0LWtleQ=="));
    }
}
