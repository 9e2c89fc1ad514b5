// Inline button routing
mod callback;

// Add, edit and delete flows
mod expense;

// Welcome, help, list, report and dashboard
mod info;

// Free-text search
mod search;
