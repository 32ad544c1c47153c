use crate::api::ApiClient;
use crate::args::SnapshotArgs;
use crate::error::AppResult;

use super::{AppContext, output, print_lines};

pub(crate) async fn run_snapshot(args: &SnapshotArgs, ctx: &AppContext) -> AppResult<()> {
    let api = ApiClient::new(&ctx.settings, ctx.auth.clone())?;
    let snapshot = api.get_metrics_snapshot(&args.test_id).await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        print_lines(&output::snapshot_lines(&snapshot));
    }
    Ok(())
}
