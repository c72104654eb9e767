mod driver_cycle;
