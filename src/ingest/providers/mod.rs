pub mod telegram_web;
