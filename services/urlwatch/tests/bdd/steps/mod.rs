mod notification_steps;
mod watch_steps;
