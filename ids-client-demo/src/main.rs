/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */
use anyhow::{anyhow, Context};
use ids_client::Client;
use log::info;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let server_url = args
        .next()
        .ok_or_else(|| anyhow!("usage: ids-client-demo <ids-url> [session-id]"))?;
    let session_id = args.next();

    let client = Client::builder()
        .server_url(server_url.as_str())
        .build()
        .with_context(|| format!("cannot use {} as an IDS URL", server_url))?;
    info!("Talking to {}", client.ids_url());

    client.ping().context("server is not an IDS")?;
    println!("API version: {}", client.get_api_version()?);
    println!("Read only:   {}", client.is_read_only()?);
    println!("Two level:   {}", client.is_two_level()?);

    if let Some(session_id) = session_id {
        let status = client.get_service_status(&session_id)?;
        println!("Locks held:  {}", status.lock_count());
        for id in status.locked_ids() {
            println!("  locked dataset {}", id);
        }
        for (data, request) in status.op_items() {
            println!("  queued {} for {}", request, data);
        }
        for id in status.failures() {
            println!("  failed datafile {}", id);
        }
    }

    Ok(())
}
