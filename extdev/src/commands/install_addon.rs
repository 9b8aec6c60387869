//! `extdev install-addon`: install temporary add-ons into a running browser.

use std::path::PathBuf;

use extdev_socket::RetryPolicy;

use crate::addon;
use crate::output;

pub async fn run(
    port: u16,
    paths: Vec<PathBuf>,
    devtools: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let installed = addon::connect_and_install(port, RetryPolicy::default(), &paths, devtools).await?;
    for addon in installed {
        output::success(&format!(
            "Installed {} from {}",
            output::emphasized(&addon.id),
            addon.path.display()
        ));
    }
    Ok(())
}
