pub mod coord_share;
