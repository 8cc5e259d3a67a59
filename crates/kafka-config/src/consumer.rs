pub struct ConsumerOptions {
    pub group_id: String,
    pub topics: Vec<String>,
}
