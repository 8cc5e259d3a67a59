use clap::Parser;
use env_logger::{Builder, Target};

use kafka_config::consumer::ConsumerOptions;
use kafka_config::KafkaConfig;
use kafka_consumer::KafkaConsumer;

#[tokio::main]
async fn main() {
    let args = match args::Cli::try_parse() {
        Ok(args) => args,
        Err(e) => {
            // clap exits with 2 on its own; the usage contract here is 1
            let _ = e.print();
            let code = if e.use_stderr() { 1 } else { 0 };
            std::process::exit(code);
        }
    };

    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }

    let mut builder = Builder::from_default_env();
    match args.log_output {
        args::LogOutput::StdOut => {
            builder.target(Target::Stdout);
        }
        args::LogOutput::StdErr => {
            builder.target(Target::Stderr);
        }
    }
    builder.init();

    let config = match KafkaConfig::from_env() {
        Ok(config) => config.with_endpoint(&args.brokers),
        Err(e) => {
            log::error!("Invalid broker configuration: {e:#}");
            std::process::exit(1);
        }
    };

    let options = ConsumerOptions {
        group_id: args.group_id,
        topics: args.topics,
    };

    let consumer = match KafkaConsumer::new(&config, &options) {
        Ok(consumer) => consumer,
        Err(e) => {
            log::error!("Failed to create consumer: {e:#}");
            std::process::exit(1);
        }
    };
    println!(
        "Created consumer in group {} for topics {:?}",
        options.group_id, options.topics
    );

    if let Err(e) = consumer.run().await {
        log::error!("Consumer terminated abnormally: {e:#}");
        std::process::exit(1);
    }
}
