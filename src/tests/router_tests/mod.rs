mod agency_tests;
mod listings_tests;
mod scan_tests;
mod search_tests;
mod tag_tests;
