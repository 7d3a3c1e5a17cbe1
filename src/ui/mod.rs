pub mod calendar_viewer;
