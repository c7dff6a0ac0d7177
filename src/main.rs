mod entry;

use volley::error::AppResult;

fn main() -> AppResult<()> {
    entry::run()
}
