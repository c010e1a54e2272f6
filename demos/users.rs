use tailcall_dataloader::config::Batch;
use tailcall_dataloader::{CancellationToken, DataLoader, Loader};

#[derive(Clone, Debug, Default)]
struct User {
    id: String,
}

struct UserLoader;

#[async_trait::async_trait]
impl Loader<String> for UserLoader {
    type Value = User;
    type Error = String;

    async fn load(&self, keys: &[String], _: &CancellationToken) -> Result<Vec<User>, String> {
        Ok(keys.iter().map(|key| User { id: key.clone() }).collect())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing::subscriber::set_global_default(tailcall_dataloader::tracing::default_tracing())?;

    let batch = Batch::default().delay(2).max_size(100);
    let users = DataLoader::with_config(UserLoader, &batch);

    let loaded = users
        .load_many(["foo".to_string(), "bar".to_string()])
        .await
        .map_err(|error| anyhow::anyhow!("{}", error))?;
    println!("{:?}", loaded);

    Ok(())
}
