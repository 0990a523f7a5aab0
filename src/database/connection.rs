use log::{debug, error};
use openssl::ssl::{SslConnector, SslMethod};
use postgres_openssl::MakeTlsConnector;
use tokio_postgres::{Client, NoTls};
use url::Url;

use crate::error::StoreError;

/// TLS connector trusting the CA file from `sslrootcert`
///
/// The server certificate is verified against that CA, so a self-signed
/// server cert works as long as the file holds it.
pub fn create_ssl_connector(sslrootcert_path: &str) -> Result<MakeTlsConnector, StoreError> {
    Ok(MakeTlsConnector::new(ssl_connector(sslrootcert_path)?))
}

fn ssl_connector(sslrootcert_path: &str) -> Result<SslConnector, StoreError> {
    let mut builder = SslConnector::builder(SslMethod::tls())
        .map_err(|e| StoreError::Tls(format!("SSL builder error: {}", e)))?;

    builder
        .set_ca_file(sslrootcert_path)
        .map_err(|e| StoreError::Tls(format!("Error loading CA cert: {}", e)))?;

    Ok(builder.build())
}

/// Split the `sslrootcert` parameter off a connection URL
///
/// tokio-postgres rejects parameters it does not know, so the certificate
/// path is removed from the query string before connecting.
pub fn split_sslrootcert(database_url: &str) -> Result<(String, Option<String>), StoreError> {
    let url = Url::parse(database_url)
        .map_err(|e| StoreError::Connection(format!("URL parse error: {}", e)))?;

    let mut sslrootcert_path = None;
    let mut clean_params = Vec::new();
    for (key, value) in url.query_pairs() {
        if key == "sslrootcert" {
            sslrootcert_path = Some(value.to_string());
        } else {
            clean_params.push((key.into_owned(), value.into_owned()));
        }
    }

    let mut clean_url = url.clone();
    clean_url.set_query(None);
    if !clean_params.is_empty() {
        let query = clean_params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        clean_url.set_query(Some(&query));
    }

    Ok((clean_url.to_string(), sslrootcert_path))
}

/// Open a single connection for one compaction pass
///
/// There is no retry here: a failed connect aborts the pass and the next
/// scheduled pass starts from scratch.
pub async fn connect(database_url: &str) -> Result<Client, StoreError> {
    let (clean_database_url, sslrootcert_path) = split_sslrootcert(database_url)?;

    let client = match sslrootcert_path {
        Some(path) => {
            debug!("Connecting with TLS using CA file {}", path);
            let connector = create_ssl_connector(&path)?;
            let (client, connection) = tokio_postgres::connect(&clean_database_url, connector).await?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    error!("Connection error: {}", e);
                }
            });
            client
        }
        None => {
            debug!("Connecting without TLS");
            let (client, connection) = tokio_postgres::connect(&clean_database_url, NoTls).await?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    error!("Connection error: {}", e);
                }
            });
            client
        }
    };

    Ok(client)
}
