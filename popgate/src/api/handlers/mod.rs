pub mod campaigns;
pub mod challenge;
pub mod discounts;
pub mod health;
pub mod info;
