use crate::api::ApiClient;
use crate::args::TestsCommand;
use crate::error::AppResult;

use super::{AppContext, output, print_lines};

pub(crate) async fn run_tests_command(command: &TestsCommand, ctx: &AppContext) -> AppResult<()> {
    let api = ApiClient::new(&ctx.settings, ctx.auth.clone())?;
    match command {
        TestsCommand::List => {
            let tests = api.list_tests().await?;
            print_lines(&output::test_list_lines(&tests, ctx.palette));
        }
        TestsCommand::Show { id } => {
            let test = api.get_test(id).await?;
            print_lines(&output::test_detail_lines(&test, ctx.palette));
        }
        TestsCommand::Stop { id } => {
            api.stop_test(id).await?;
            println!("Stopped test {}", id);
        }
        TestsCommand::Create(create) => {
            let test = api.create_test(&create.to_request()).await?;
            println!("Created test {} ({})", test.id, test.status);
        }
    }
    Ok(())
}
