pub mod scoring_date;
