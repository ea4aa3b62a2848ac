mod blocklist;
mod common;
mod routing;
