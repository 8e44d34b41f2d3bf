// Integration tests entry point
// Drives the full edge (host → resolver → pipeline) against real storage

mod integration {
    pub mod common;
    mod database_site_test;
    mod deploy_test;
    mod local_site_test;
}
