// This file is part of AAWallet.
//
// AAWallet is free software: you can redistribute it and/or modify it under the
// terms of the GNU Lesser General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version.
//
// AAWallet is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with AAWallet.
// If not, see https://www.gnu.org/licenses/.

use aawallet_signer::KeyStore;
use clap::Args;

use super::signer::SignerArgs;

/// CLI options for listing keys
#[derive(Args)]
pub struct KeysCliArgs {
    #[command(flatten)]
    signer: SignerArgs,
}

/// Prints the configured keys as JSON, one per line.
///
/// Reads the same configuration as the key server, so it shows exactly
/// which keys a server started with these options would serve.
pub fn run(args: KeysCliArgs) -> anyhow::Result<()> {
    let keys = KeyStore::from_settings(&args.signer.key_settings())?;
    if keys.is_empty() {
        anyhow::bail!("no keys configured");
    }
    for key in keys.keys() {
        println!("{}", serde_json::to_string(&key)?);
    }
    Ok(())
}
