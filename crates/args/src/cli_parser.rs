use clap::{Parser, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "kafka-tail")]
#[command(author)]
#[command(version)]
#[command(propagate_version = true)]
#[command(about = "Consumes messages from Kafka topics and prints them to stdout.", long_about = None)]
pub struct Cli {
    pub brokers: String,
    pub group_id: String,
    #[arg(required = true)]
    pub topics: Vec<String>,
    #[clap(value_enum, default_value_t=LogOutput::StdErr)]
    #[arg(short, long)]
    pub log_output: LogOutput,
}

#[derive(ValueEnum, Clone, Debug)]
pub enum LogOutput {
    StdOut,
    StdErr,
}
