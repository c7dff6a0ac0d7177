use super::*;
use crate::error::{AppError, AppResult};
use clap::Parser;
use std::time::Duration;


fn parse_test_args<I, T>(argv: I) -> AppResult<TesterArgs>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    TesterArgs::try_parse_from(argv)
        .map_err(|err| AppError::validation(format!("Expected parse success: {}", err)))
}
