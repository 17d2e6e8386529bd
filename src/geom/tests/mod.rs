mod test_contour_basic;
mod test_cylinder_basic;
mod test_tessellator_basic;
