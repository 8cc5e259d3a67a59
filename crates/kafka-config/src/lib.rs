use config::Config;
use config::File;
use rdkafka::ClientConfig;
use serde::Deserialize;
use serde::Serialize;

pub mod consumer;

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct Sasl {
    pub username: String,
    pub password: String,
    pub mechanisms: String,
}

impl Default for Sasl {
    fn default() -> Self {
        Sasl {
            mechanisms: "PLAIN".to_string(),
            username: "".to_string(),
            password: "".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct KafkaConfig {
    pub securityprotocol: String,
    pub endpoint: String,
    pub sasl: Option<Sasl>,
}

impl KafkaConfig {
    pub fn from_env() -> anyhow::Result<KafkaConfig> {
        let mut builder = Config::builder();

        builder = builder.add_source(Config::try_from(&KafkaConfig::default())?);
        builder = builder
            .add_source(File::new(".kafka.config.yaml", config::FileFormat::Yaml).required(false));
        builder = builder
            .add_source(File::new(".kafka.config.json", config::FileFormat::Json).required(false));

        let path_from_env = std::env::var("KAFKA_CONFIG_PATH");
        builder = if let Ok(path_from_env) = path_from_env {
            log::info!("Loading config from: {path_from_env}");
            if path_from_env.ends_with("yaml") {
                builder = builder
                    .add_source(File::new(&path_from_env, config::FileFormat::Yaml).required(true));
                builder
            } else if path_from_env.ends_with("json") {
                builder = builder
                    .add_source(File::new(&path_from_env, config::FileFormat::Json).required(true));
                builder
            } else {
                log::warn!("File type not supported. Ignore file: {path_from_env}");
                builder
            }
        } else {
            builder
        };

        builder = builder.add_source(config::Environment::with_prefix("KAFKA").separator("_"));

        let kafka_config: KafkaConfig = builder.build()?.try_deserialize()?;
        Ok(kafka_config)
    }

    // The broker list given on the command line wins over any layered source.
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }
}

impl Default for KafkaConfig {
    fn default() -> Self {
        KafkaConfig {
            endpoint: "localhost:9092".to_string(),
            securityprotocol: "plaintext".to_string(),
            sasl: None,
        }
    }
}

impl From<KafkaConfig> for ClientConfig {
    fn from(config: KafkaConfig) -> Self {
        let mut client_config = ClientConfig::new();

        client_config.set("bootstrap.servers", config.endpoint.clone());
        client_config.set("security.protocol", config.securityprotocol.clone());
        if let Some(sasl) = config.sasl {
            client_config.set("sasl.mechanisms", sasl.mechanisms);
            client_config.set("sasl.username", sasl.username);
            client_config.set("sasl.password", sasl.password);
        }

        client_config
    }
}

#[cfg(test)]
mod tests {
    use rdkafka::ClientConfig;
    use serial_test::serial;

    use crate::KafkaConfig;

    #[test]
    #[serial]
    fn test_create_kafka_config() {
        std::env::set_var("KAFKA_ENDPOINT", "endpoint:9092");
        std::env::set_var("KAFKA_SASL_USERNAME", "username");
        std::env::set_var("KAFKA_SASL_PASSWORD", "password");

        let cfg: KafkaConfig = KafkaConfig::from_env().unwrap();
        let sasl = cfg.sasl.unwrap();

        assert_eq!(sasl.username, "username");
        assert_eq!(sasl.password, "password");
        assert_eq!(sasl.mechanisms, "PLAIN");
        assert_eq!(cfg.endpoint, "endpoint:9092");
        assert_eq!(cfg.securityprotocol, "plaintext");

        std::env::remove_var("KAFKA_ENDPOINT");
        std::env::remove_var("KAFKA_SASL_USERNAME");
        std::env::remove_var("KAFKA_SASL_PASSWORD");
    }

    #[test]
    #[serial]
    fn test_kafka_config_defaults() {
        let cfg: KafkaConfig = KafkaConfig::from_env().unwrap();

        assert_eq!(cfg.endpoint, "localhost:9092");
        assert_eq!(cfg.securityprotocol, "plaintext");
        assert!(cfg.sasl.is_none());
    }

    #[test]
    #[serial]
    fn test_kafka_config_from_file_using_env_path() {
        std::env::set_var("KAFKA_CONFIG_PATH", "resources/.kafka.example.yaml");
        let cfg: KafkaConfig = KafkaConfig::from_env().unwrap();

        assert_eq!(cfg.endpoint, "broker.example.com:9092");
        assert_eq!(cfg.securityprotocol, "SASL_SSL");
        assert_eq!(cfg.sasl.unwrap().username, "MyApiKey");

        std::env::remove_var("KAFKA_CONFIG_PATH");
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        std::env::set_var("KAFKA_CONFIG_PATH", "resources/.kafka.example.yaml");
        std::env::set_var("KAFKA_ENDPOINT", "endpoint:9092");

        let cfg: KafkaConfig = KafkaConfig::from_env().unwrap();

        assert_eq!(cfg.endpoint, "endpoint:9092");
        assert_eq!(cfg.sasl.unwrap().username, "MyApiKey");

        std::env::remove_var("KAFKA_CONFIG_PATH");
        std::env::remove_var("KAFKA_ENDPOINT");
    }

    #[test]
    fn test_cli_endpoint_wins() {
        let cfg = KafkaConfig::default().with_endpoint("cli.example.com:9092");

        assert_eq!(cfg.endpoint, "cli.example.com:9092");
    }

    #[test]
    fn test_client_config_from_kafka_config() {
        let cfg = KafkaConfig {
            endpoint: "broker:9092".to_string(),
            securityprotocol: "SASL_SSL".to_string(),
            sasl: Some(crate::Sasl {
                username: "user".to_string(),
                password: "pass".to_string(),
                mechanisms: "PLAIN".to_string(),
            }),
        };

        let client: ClientConfig = cfg.into();

        assert_eq!(client.get("bootstrap.servers"), Some("broker:9092"));
        assert_eq!(client.get("security.protocol"), Some("SASL_SSL"));
        assert_eq!(client.get("sasl.mechanisms"), Some("PLAIN"));
        assert_eq!(client.get("sasl.username"), Some("user"));
    }

    #[test]
    fn test_client_config_without_sasl() {
        let client: ClientConfig = KafkaConfig::default().into();

        assert_eq!(client.get("bootstrap.servers"), Some("localhost:9092"));
        assert_eq!(client.get("security.protocol"), Some("plaintext"));
        assert_eq!(client.get("sasl.username"), None);
    }
}
