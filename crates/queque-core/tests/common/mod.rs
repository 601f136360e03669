use testcontainers::ContainerAsync;
use testcontainers_modules::{
    localstack::LocalStack,
    testcontainers::{runners::AsyncRunner, ImageExt, TestcontainersError},
};

pub async fn localstack() -> Result<(String, ContainerAsync<LocalStack>), TestcontainersError> {
    let request = LocalStack::default()
        .with_tag("latest")
        .with_env_var("SERVICES", "sqs")
        .with_env_var("SKIP_SSL_CERT_DOWNLOAD", "1");
    let container = request.start().await?;

    let host_ip = container.get_host().await?;
    let host_port = container.get_host_port_ipv4(4566).await?;
    let endpoint_url = format!("http://{host_ip}:{host_port}");

    Ok((endpoint_url, container))
}

/// Client config pointing at a LocalStack endpoint with dummy credentials.
pub fn local_config(endpoint_url: &str, queue_name: &str) -> queque::Config {
    let mut config = queque::Config::new(queue_name);
    config.endpoint_url = Some(endpoint_url.to_string());
    config.region = Some("us-east-1".to_string());
    config.access_key = Some("test".to_string());
    config.secret_access_key = Some("test".to_string());
    config.wait_time_seconds = 1;
    config.retry_timestep_seconds = 1;
    config
}

/// Generate a unique queue name for testing, using a UUID suffix.
pub fn unique_queue_name(prefix: &str) -> String {
    format!("{}-{}", prefix, uuid::Uuid::new_v4().simple())
}
