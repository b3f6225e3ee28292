use std::sync::Arc;

use crate::color::{MaybePaint, TARGET_TEXT};
use crate::routing::probe::ProbeMode;
use crate::routing::Error as RoutingError;
use crate::runtime::{DispatchError, Dispatcher};
use crate::utils::errors::{DEFAULT_EXIT_CODE, USAGE_EXIT_CODE};
use crate::AskArgs;

use super::Context;

pub(crate) async fn ask_cmd(ctx: &Context, args: &AskArgs) -> i32 {
    let dispatcher = Arc::new(Dispatcher::new(
        ctx.resolver(ProbeMode::Live),
        Arc::clone(&ctx.adapters),
        ctx.sink(),
        &ctx.settings,
    ));

    let request = args.target.request(&ctx.settings);

    let result = match dispatcher.spawn_complete(request, args.prompt.clone()).await {
        Ok(result) => result,
        Err(err) => Err(DispatchError::from(err)),
    };

    match result {
        Ok(completion) => {
            for failure in &completion.failures {
                tracing::info!(candidate = %failure.candidate, error = %failure.error, "skipped after failed call");
            }

            eprintln!(
                "model: {} ({})",
                TARGET_TEXT.maybe_paint(completion.target.candidate().to_string().as_str()),
                completion.target.source
            );
            println!("{}", completion.text);

            0
        }
        Err(DispatchError::Resolution(err @ RoutingError::Input(_))) => {
            crate::error!("{}", err);
            USAGE_EXIT_CODE
        }
        Err(err) => {
            crate::error!("{}", err);
            DEFAULT_EXIT_CODE
        }
    }
}
