mod helpers;

mod auth;
mod orders;
mod review;
