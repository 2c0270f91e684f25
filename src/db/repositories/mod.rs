mod events;
mod labels;
mod tasks;
